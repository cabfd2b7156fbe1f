//! One-shot pull and push between the record store and a remote store
//!
//! Both directions are additive. Pull adopts remote records whose ids are
//! unknown locally and never overwrites a local record. Push sends local
//! records whose ids the remote does not have and never touches the store.
//! Edits and deletions do not travel in either direction.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::client::RemoteStore;
use crate::error::Error;
use crate::model::RecordId;
use crate::storage::{RecordStore, run_blocking};

/// Step of a sync run that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    FetchProjects,
    FetchTasks,
    PushProject(RecordId),
    PushTask(RecordId),
    Persist,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchProjects => write!(f, "fetch projects"),
            Self::FetchTasks => write!(f, "fetch tasks"),
            Self::PushProject(id) => write!(f, "push project {}", id),
            Self::PushTask(id) => write!(f, "push task {}", id),
            Self::Persist => write!(f, "save merged records"),
        }
    }
}

/// A failure recorded during a sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub stage: SyncStage,
    pub code: &'static str,
    pub message: String,
}

impl SyncFailure {
    fn new(stage: SyncStage, error: &Error) -> Self {
        Self {
            stage,
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.stage, self.code, self.message)
    }
}

/// Outcome of a pull
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub projects_added: usize,
    pub tasks_added: usize,
    pub tasks_skipped: usize,
    pub failures: Vec<SyncFailure>,
}

impl PullReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line outcome for the user
    pub fn summary(&self) -> String {
        let counts = format!(
            "{} new project(s), {} new task(s)",
            self.projects_added, self.tasks_added
        );
        if self.is_success() {
            format!("Pull complete: {}", counts)
        } else {
            format!(
                "Pull failed ({} error(s)): {}; first error: {}",
                self.failures.len(),
                counts,
                self.failures[0]
            )
        }
    }
}

/// Outcome of a push
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub projects_pushed: usize,
    pub tasks_pushed: usize,
    /// Remote listings that could not be read; the push went ahead as if
    /// the remote were empty
    pub warnings: Vec<SyncFailure>,
    pub failures: Vec<SyncFailure>,
}

impl PushReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        let counts = format!(
            "{} project(s), {} task(s) sent",
            self.projects_pushed, self.tasks_pushed
        );
        if self.is_success() {
            format!("Push complete: {}", counts)
        } else {
            format!(
                "Push failed ({} error(s)): {}; first error: {}",
                self.failures.len(),
                counts,
                self.failures[0]
            )
        }
    }
}

/// Runs pulls and pushes, one at a time
pub struct SyncCoordinator {
    store: Arc<RecordStore>,
    remote: Arc<dyn RemoteStore>,
    running: Mutex<()>,
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator").finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    pub fn new(store: Arc<RecordStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            remote,
            running: Mutex::new(()),
        }
    }

    /// Merge remote records into the local store.
    ///
    /// A failed fetch leaves that collection untouched but does not stop the
    /// other one from being fetched and merged.
    pub async fn pull(&self) -> PullReport {
        let _running = self.running.lock().await;
        info!("Pulling from remote store");

        let mut report = PullReport::default();

        let projects = match self.remote.fetch_projects().await {
            Ok(projects) => Some(projects),
            Err(e) => {
                warn!(error = %e, "Could not fetch remote projects");
                report.failures.push(SyncFailure::new(SyncStage::FetchProjects, &e));
                None
            }
        };

        let tasks = match self.remote.fetch_tasks().await {
            Ok(tasks) => Some(tasks),
            Err(e) => {
                warn!(error = %e, "Could not fetch remote tasks");
                report.failures.push(SyncFailure::new(SyncStage::FetchTasks, &e));
                None
            }
        };

        if projects.is_some() || tasks.is_some() {
            let merged =
                run_blocking(&self.store, move |store| store.merge_remote(projects, tasks)).await;
            match merged {
                Ok(outcome) => {
                    report.projects_added = outcome.projects_added;
                    report.tasks_added = outcome.tasks_added;
                    report.tasks_skipped = outcome.tasks_skipped;
                }
                Err(e) => {
                    warn!(error = %e, "Could not save merged records");
                    report.failures.push(SyncFailure::new(SyncStage::Persist, &e));
                }
            }
        }

        info!(
            projects_added = report.projects_added,
            tasks_added = report.tasks_added,
            tasks_skipped = report.tasks_skipped,
            failures = report.failures.len(),
            "Pull finished"
        );
        report
    }

    /// Send local records the remote does not have yet.
    ///
    /// Each record is pushed on its own; one failure does not stop the rest.
    pub async fn push(&self) -> PushReport {
        let _running = self.running.lock().await;
        info!("Pushing to remote store");

        let mut report = PushReport::default();

        let remote_projects: HashSet<RecordId> = match self.remote.fetch_projects().await {
            Ok(projects) => projects.iter().map(|p| p.id).collect(),
            Err(e) => {
                warn!(error = %e, "Could not list remote projects, pushing all");
                report.warnings.push(SyncFailure::new(SyncStage::FetchProjects, &e));
                HashSet::new()
            }
        };

        let remote_tasks: HashSet<RecordId> = match self.remote.fetch_tasks().await {
            Ok(tasks) => tasks.iter().map(|t| t.id).collect(),
            Err(e) => {
                warn!(error = %e, "Could not list remote tasks, pushing all");
                report.warnings.push(SyncFailure::new(SyncStage::FetchTasks, &e));
                HashSet::new()
            }
        };

        for project in self
            .store
            .list_projects()
            .into_iter()
            .filter(|p| !remote_projects.contains(&p.id))
        {
            match self.remote.push_project(&project).await {
                Ok(()) => report.projects_pushed += 1,
                Err(e) => {
                    warn!(id = project.id, error = %e, "Project push failed");
                    report
                        .failures
                        .push(SyncFailure::new(SyncStage::PushProject(project.id), &e));
                }
            }
        }

        for task in self
            .store
            .list_tasks()
            .into_iter()
            .filter(|t| !remote_tasks.contains(&t.id))
        {
            match self.remote.push_task(&task).await {
                Ok(()) => report.tasks_pushed += 1,
                Err(e) => {
                    warn!(id = task.id, error = %e, "Task push failed");
                    report
                        .failures
                        .push(SyncFailure::new(SyncStage::PushTask(task.id), &e));
                }
            }
        }

        info!(
            projects_pushed = report.projects_pushed,
            tasks_pushed = report.tasks_pushed,
            failures = report.failures.len(),
            "Push finished"
        );
        report
    }

    /// Run [`pull`](Self::pull) on a background task
    pub fn spawn_pull(self: &Arc<Self>) -> JoinHandle<PullReport> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.pull().await })
    }

    /// Run [`push`](Self::push) on a background task
    pub fn spawn_push(self: &Arc<Self>) -> JoinHandle<PushReport> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.push().await })
    }
}
