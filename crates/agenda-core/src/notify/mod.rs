//! Reminder notifications
//!
//! The [`NotificationScheduler`] decides when a task is due and what to say;
//! delivery is delegated to a [`Notifier`].

mod scheduler;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{RecordId, Task};

pub use scheduler::{NotificationScheduler, PassReport, SchedulerConfig, SchedulerState};

/// Shown instead of the project name when the project is gone
pub const MISSING_PROJECT_LABEL: &str = "No project";

/// Longest description excerpt carried in a reminder body
const BODY_EXCERPT_CHARS: usize = 100;

/// A reminder ready to be shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub task_id: RecordId,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn for_task(task: &Task, project_name: &str) -> Self {
        let excerpt: String = task.description.chars().take(BODY_EXCERPT_CHARS).collect();
        let body = if excerpt.trim().is_empty() {
            format!("Project: {}", project_name)
        } else {
            format!("Project: {}\n{}", project_name, excerpt)
        };

        Self {
            task_id: task.id,
            title: format!("Reminder: {}", task.title),
            body,
        }
    }
}

/// Delivers reminders to the user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes reminders to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(
            task_id = notification.task_id,
            title = %notification.title,
            body = %notification.body,
            "Reminder"
        );
        Ok(())
    }
}

/// Forwards reminders over a channel to whoever displays them
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.tx
            .send(notification.clone())
            .await
            .map_err(|_| Error::NotificationFailed("notification receiver closed".to_string()))
    }
}
