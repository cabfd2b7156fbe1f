//! Background reminder loop
//!
//! Lifecycle is `Idle → Running → Stopped`; a stopped scheduler cannot be
//! started again. Each pass runs on its own task so a panicking notifier
//! costs one pass, not the loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{MISSING_PROJECT_LABEL, Notification, Notifier};
use crate::config::{DEFAULT_LOOKAHEAD_SECS, DEFAULT_POLL_INTERVAL_SECS, NotificationConfig};
use crate::error::{Error, Result};
use crate::storage::{RecordStore, run_blocking};

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Polling cadence and due-soon window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub lookahead: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            lookahead: Duration::from_secs(DEFAULT_LOOKAHEAD_SECS),
        }
    }
}

impl From<&NotificationConfig> for SchedulerConfig {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            lookahead: Duration::from_secs(config.lookahead_secs),
        }
    }
}

/// What a single pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Reminders delivered and recorded
    pub sent: usize,
    /// Tasks whose schedule could not be parsed
    pub unparseable: usize,
    /// Deliveries or bookkeeping that failed; retried on a later pass
    pub failed: usize,
}

/// Everything one pass needs, cheap to clone onto a task
#[derive(Clone)]
struct ReminderPass {
    store: Arc<RecordStore>,
    notifier: Arc<dyn Notifier>,
    lookahead: chrono::Duration,
    cancel: CancellationToken,
}

impl ReminderPass {
    fn is_due(&self, now: NaiveDateTime, at: NaiveDateTime) -> bool {
        now >= at || at - now <= self.lookahead
    }

    async fn run(&self, now: NaiveDateTime) -> PassReport {
        let mut report = PassReport::default();

        for task in self.store.pending_reminders() {
            if self.cancel.is_cancelled() {
                debug!("Scheduler stopping, abandoning pass");
                break;
            }

            let (Some(scheduled_at), Some(at)) = (task.scheduled_at.as_deref(), task.scheduled_time())
            else {
                debug!(task_id = task.id, scheduled_at = ?task.scheduled_at, "Unparseable schedule, skipping");
                report.unparseable += 1;
                continue;
            };

            if !self.is_due(now, at) {
                continue;
            }

            let project_name = self
                .store
                .get_project(task.project_id)
                .map(|p| p.name)
                .unwrap_or_else(|| MISSING_PROJECT_LABEL.to_string());
            let notification = Notification::for_task(&task, &project_name);

            if let Err(e) = self.notifier.notify(&notification).await {
                warn!(task_id = task.id, error = %e, "Reminder delivery failed");
                report.failed += 1;
                continue;
            }

            let (task_id, scheduled_at) = (task.id, scheduled_at.to_string());
            let marked = run_blocking(&self.store, move |store| {
                store.mark_notified_if_scheduled(task_id, &scheduled_at)
            })
            .await;
            match marked {
                Ok(true) => report.sent += 1,
                Ok(false) => {
                    debug!(task_id = task.id, "Task changed during pass, reminder re-armed")
                }
                Err(e) => {
                    warn!(task_id = task.id, error = %e, "Could not record reminder");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

struct Lifecycle {
    state: SchedulerState,
}

/// Periodically fires reminders for due tasks, once per schedule
pub struct NotificationScheduler {
    pass: ReminderPass,
    interval: Duration,
    lifecycle: Mutex<Lifecycle>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("state", &self.state())
            .field("interval", &self.interval)
            .finish()
    }
}

impl NotificationScheduler {
    pub fn new(
        store: Arc<RecordStore>,
        notifier: Arc<dyn Notifier>,
        config: SchedulerConfig,
    ) -> Self {
        let lookahead = chrono::Duration::from_std(config.lookahead)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_LOOKAHEAD_SECS as i64));

        Self {
            pass: ReminderPass {
                store,
                notifier,
                lookahead,
                cancel: CancellationToken::new(),
            },
            interval: config.interval,
            lifecycle: Mutex::new(Lifecycle {
                state: SchedulerState::Idle,
            }),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SchedulerState {
        self.lifecycle().state
    }

    /// Launch the polling loop on the current tokio runtime.
    ///
    /// The first pass runs immediately.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        match lifecycle.state {
            SchedulerState::Idle => {}
            SchedulerState::Running => {
                return Err(Error::SchedulerState("scheduler is already running".to_string()));
            }
            SchedulerState::Stopped => {
                return Err(Error::SchedulerState(
                    "scheduler has been stopped and cannot be restarted".to_string(),
                ));
            }
        }

        let handle = tokio::spawn(run_loop(self.pass.clone(), self.interval));

        // `stop` only takes this lock after moving the state out of Idle,
        // which cannot happen while we hold the lifecycle guard.
        match self.handle.try_lock() {
            Ok(mut slot) => *slot = Some(handle),
            Err(_) => handle.abort(),
        }
        lifecycle.state = SchedulerState::Running;

        info!(interval_secs = self.interval.as_secs(), "Notification scheduler started");
        Ok(())
    }

    /// Stop the loop and wait for an in-flight pass to finish.
    ///
    /// Idempotent. Once this returns the scheduler makes no further changes
    /// to the store.
    pub async fn stop(&self) {
        {
            let mut lifecycle = self.lifecycle();
            lifecycle.state = SchedulerState::Stopped;
        }
        self.pass.cancel.cancel();

        let mut slot = self.handle.lock().await;
        if let Some(handle) = slot.take() {
            if let Err(e) = handle.await
                && !e.is_cancelled()
            {
                error!(error = %e, "Notification scheduler loop ended abnormally");
            }
            info!("Notification scheduler stopped");
        }
    }

    /// Run one pass against `now` without the loop
    pub async fn run_pass(&self, now: NaiveDateTime) -> PassReport {
        self.pass.run(now).await
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        self.pass.cancel.cancel();
    }
}

async fn run_loop(pass: ReminderPass, interval: Duration) {
    let cancel = pass.cancel.clone();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let now = Local::now().naive_local();
        let worker = pass.clone();
        match tokio::spawn(async move { worker.run(now).await }).await {
            Ok(report) => {
                if report.sent > 0 || report.failed > 0 {
                    info!(
                        sent = report.sent,
                        failed = report.failed,
                        unparseable = report.unparseable,
                        "Reminder pass finished"
                    );
                }
            }
            Err(e) => error!(error = %e, "Reminder pass crashed, retrying next interval"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    debug!("Notification scheduler loop exited");
}
