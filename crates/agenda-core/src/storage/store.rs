//! The record store
//!
//! `RecordStore` is the single owner of the project and task collections.
//! Every read and write goes through one mutex. Mutations build the new
//! collection next to the current one, write it to disk, and only then swap
//! it in, so memory never runs ahead of the snapshot on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use super::snapshot::{load_collection, write_collection};
use crate::error::{Error, Result};
use crate::model::{
    NewTask, Project, ProjectColor, RecordId, Task, TaskUpdate, next_id, normalize_schedule,
    now_timestamp,
};

/// File holding the project collection
pub const PROJECTS_FILE: &str = "projects.json";

/// File holding the task collection
pub const TASKS_FILE: &str = "tasks.json";

#[derive(Debug, Default)]
struct Collections {
    projects: Vec<Project>,
    tasks: Vec<Task>,
}

/// Counts of what a remote merge appended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub projects_added: usize,
    pub tasks_added: usize,
    /// Remote tasks left out because their project is not known locally
    pub tasks_skipped: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.projects_added > 0 || self.tasks_added > 0
    }
}

/// Summary counts for status displays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub projects: usize,
    pub tasks: usize,
    pub completed_tasks: usize,
    pub pending_reminders: usize,
}

/// Durable, lock-guarded store of projects and tasks
#[derive(Debug)]
pub struct RecordStore {
    data_dir: PathBuf,
    projects_path: PathBuf,
    tasks_path: PathBuf,
    state: Mutex<Collections>,
}

impl RecordStore {
    /// Open the store in `data_dir`, loading any existing snapshots.
    ///
    /// Missing files are empty collections. Unreadable or structurally
    /// invalid files are an error; individual bad records are dropped.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            Error::PersistenceError(format!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        let projects_path = data_dir.join(PROJECTS_FILE);
        let tasks_path = data_dir.join(TASKS_FILE);

        let projects: Vec<Project> = load_collection(&projects_path, "project")?;
        let mut tasks: Vec<Task> = load_collection(&tasks_path, "task")?;

        let project_ids: HashSet<RecordId> = projects.iter().map(|p| p.id).collect();
        let before = tasks.len();
        tasks.retain(|t| project_ids.contains(&t.project_id));
        if tasks.len() < before {
            warn!(
                dropped = before - tasks.len(),
                "Ignoring tasks whose project no longer exists"
            );
        }

        info!(
            data_dir = %data_dir.display(),
            projects = projects.len(),
            tasks = tasks.len(),
            "Record store opened"
        );

        Ok(Self {
            data_dir,
            projects_path,
            tasks_path,
            state: Mutex::new(Collections { projects, tasks }),
        })
    }

    /// Directory holding the snapshot files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // A panic while holding the lock cannot leave a half-applied mutation
    // (collections are swapped whole), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit_projects(&self, state: &mut Collections, projects: Vec<Project>) -> Result<()> {
        write_collection(&self.projects_path, &projects)?;
        state.projects = projects;
        Ok(())
    }

    fn commit_tasks(&self, state: &mut Collections, tasks: Vec<Task>) -> Result<()> {
        write_collection(&self.tasks_path, &tasks)?;
        state.tasks = tasks;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Projects
    // ---------------------------------------------------------------------

    /// Create a project with the next free id
    pub fn create_project(
        &self,
        name: &str,
        description: &str,
        color: ProjectColor,
    ) -> Result<Project> {
        let mut state = self.lock();

        let project = Project {
            id: next_id(state.projects.iter().map(|p| p.id))?,
            name: name.to_string(),
            description: description.to_string(),
            color,
            created_at: now_timestamp(),
        };

        let mut projects = state.projects.clone();
        projects.push(project.clone());
        self.commit_projects(&mut state, projects)?;

        debug!(id = project.id, name = %project.name, "Project created");
        Ok(project)
    }

    /// Replace a project's editable fields; `false` if the id is unknown
    pub fn update_project(
        &self,
        id: RecordId,
        name: &str,
        description: &str,
        color: ProjectColor,
    ) -> Result<bool> {
        let mut state = self.lock();

        let Some(index) = state.projects.iter().position(|p| p.id == id) else {
            return Ok(false);
        };

        let mut projects = state.projects.clone();
        let project = &mut projects[index];
        project.name = name.to_string();
        project.description = description.to_string();
        project.color = color;
        self.commit_projects(&mut state, projects)?;

        debug!(id, "Project updated");
        Ok(true)
    }

    /// Delete a project together with all of its tasks.
    ///
    /// Tasks are written first. If the project write then fails, the
    /// previous task collection is written back before the error is
    /// returned, so a failed delete leaves both files as they were.
    pub fn delete_project(&self, id: RecordId) -> Result<bool> {
        let mut state = self.lock();

        if !state.projects.iter().any(|p| p.id == id) {
            return Ok(false);
        }

        let previous_tasks = state.tasks.clone();
        let tasks: Vec<Task> = previous_tasks
            .iter()
            .filter(|t| t.project_id != id)
            .cloned()
            .collect();
        let removed_tasks = previous_tasks.len() - tasks.len();
        if removed_tasks > 0 {
            self.commit_tasks(&mut state, tasks)?;
        }

        let projects: Vec<Project> = state
            .projects
            .iter()
            .filter(|p| p.id != id)
            .cloned()
            .collect();
        if let Err(e) = self.commit_projects(&mut state, projects) {
            if removed_tasks > 0
                && let Err(rollback) = self.commit_tasks(&mut state, previous_tasks)
            {
                error!(id, error = %rollback, "Could not restore tasks after failed project delete");
            }
            return Err(e);
        }

        info!(id, removed_tasks, "Project deleted");
        Ok(true)
    }

    pub fn get_project(&self, id: RecordId) -> Option<Project> {
        self.lock().projects.iter().find(|p| p.id == id).cloned()
    }

    pub fn list_projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    // ---------------------------------------------------------------------
    // Tasks
    // ---------------------------------------------------------------------

    /// Create a task under an existing project
    pub fn create_task(&self, new_task: NewTask) -> Result<Task> {
        let mut state = self.lock();

        if !state.projects.iter().any(|p| p.id == new_task.project_id) {
            return Err(Error::ProjectNotFound(new_task.project_id));
        }

        let task = Task {
            id: next_id(state.tasks.iter().map(|t| t.id))?,
            title: new_task.title,
            description: new_task.description,
            created_at: now_timestamp(),
            project_id: new_task.project_id,
            completed: false,
            scheduled_at: normalize_schedule(new_task.scheduled_at),
            notified: false,
            priority: new_task.priority,
        };

        let mut tasks = state.tasks.clone();
        tasks.push(task.clone());
        self.commit_tasks(&mut state, tasks)?;

        debug!(id = task.id, project_id = task.project_id, "Task created");
        Ok(task)
    }

    /// Replace a task's mutable fields; `false` if the id is unknown.
    ///
    /// A different schedule re-arms the reminder.
    pub fn update_task(&self, id: RecordId, update: TaskUpdate) -> Result<bool> {
        let mut state = self.lock();

        let Some(index) = state.tasks.iter().position(|t| t.id == id) else {
            return Ok(false);
        };

        let mut tasks = state.tasks.clone();
        let task = &mut tasks[index];
        let scheduled_at = normalize_schedule(update.scheduled_at);
        if task.scheduled_at != scheduled_at {
            task.notified = false;
        }
        task.title = update.title;
        task.description = update.description;
        task.completed = update.completed;
        task.scheduled_at = scheduled_at;
        task.priority = update.priority;
        self.commit_tasks(&mut state, tasks)?;

        debug!(id, "Task updated");
        Ok(true)
    }

    pub fn delete_task(&self, id: RecordId) -> Result<bool> {
        let mut state = self.lock();

        if !state.tasks.iter().any(|t| t.id == id) {
            return Ok(false);
        }

        let tasks: Vec<Task> = state.tasks.iter().filter(|t| t.id != id).cloned().collect();
        self.commit_tasks(&mut state, tasks)?;

        debug!(id, "Task deleted");
        Ok(true)
    }

    /// Flip `completed`; returns the new value, `None` if the id is unknown
    pub fn toggle_task_completed(&self, id: RecordId) -> Result<Option<bool>> {
        let mut state = self.lock();

        let Some(index) = state.tasks.iter().position(|t| t.id == id) else {
            return Ok(None);
        };

        let mut tasks = state.tasks.clone();
        let completed = !tasks[index].completed;
        tasks[index].completed = completed;
        self.commit_tasks(&mut state, tasks)?;

        Ok(Some(completed))
    }

    /// Record that a reminder went out. Idempotent; `false` if the id is unknown.
    pub fn mark_notified(&self, task_id: RecordId) -> Result<bool> {
        self.mark_notified_where(task_id, |_| true)
    }

    /// Like [`mark_notified`](Self::mark_notified), but only while the task
    /// still carries `scheduled_at`. Returns whether the task is now marked.
    pub fn mark_notified_if_scheduled(&self, task_id: RecordId, scheduled_at: &str) -> Result<bool> {
        self.mark_notified_where(task_id, |t| t.scheduled_at.as_deref() == Some(scheduled_at))
    }

    fn mark_notified_where(
        &self,
        task_id: RecordId,
        still_current: impl Fn(&Task) -> bool,
    ) -> Result<bool> {
        let mut state = self.lock();

        let Some(index) = state.tasks.iter().position(|t| t.id == task_id) else {
            return Ok(false);
        };
        if !still_current(&state.tasks[index]) {
            return Ok(false);
        }
        if state.tasks[index].notified {
            return Ok(true);
        }

        let mut tasks = state.tasks.clone();
        tasks[index].notified = true;
        self.commit_tasks(&mut state, tasks)?;

        debug!(task_id, "Task marked notified");
        Ok(true)
    }

    pub fn get_task(&self, id: RecordId) -> Option<Task> {
        self.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Tasks of one project, in store order
    pub fn list_tasks_by_project(&self, project_id: RecordId) -> Vec<Task> {
        self.lock()
            .tasks
            .iter()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect()
    }

    /// Open, scheduled tasks that have not been reminded yet
    pub fn pending_reminders(&self) -> Vec<Task> {
        self.lock()
            .tasks
            .iter()
            .filter(|t| t.awaiting_reminder())
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.lock();
        StoreStats {
            projects: state.projects.len(),
            tasks: state.tasks.len(),
            completed_tasks: state.tasks.iter().filter(|t| t.completed).count(),
            pending_reminders: state.tasks.iter().filter(|t| t.awaiting_reminder()).count(),
        }
    }

    // ---------------------------------------------------------------------
    // Remote merge
    // ---------------------------------------------------------------------

    /// Append remote records whose ids are not known locally.
    ///
    /// Local records always win. `None` means that side was not fetched and
    /// is left alone. Remote tasks must belong to a project that exists once
    /// the project side has been merged; others are skipped. Only
    /// collections that actually grew are written.
    pub fn merge_remote(
        &self,
        remote_projects: Option<Vec<Project>>,
        remote_tasks: Option<Vec<Task>>,
    ) -> Result<MergeOutcome> {
        let mut state = self.lock();
        let mut outcome = MergeOutcome::default();

        if let Some(remote_projects) = remote_projects {
            let mut known: HashSet<RecordId> = state.projects.iter().map(|p| p.id).collect();
            let mut projects = state.projects.clone();
            for project in remote_projects {
                if known.insert(project.id) {
                    projects.push(project);
                    outcome.projects_added += 1;
                }
            }
            if outcome.projects_added > 0 {
                self.commit_projects(&mut state, projects)?;
            }
        }

        if let Some(remote_tasks) = remote_tasks {
            let project_ids: HashSet<RecordId> = state.projects.iter().map(|p| p.id).collect();
            let mut known: HashSet<RecordId> = state.tasks.iter().map(|t| t.id).collect();
            let mut tasks = state.tasks.clone();
            for task in remote_tasks {
                if known.contains(&task.id) {
                    continue;
                }
                if !project_ids.contains(&task.project_id) {
                    warn!(
                        task_id = task.id,
                        project_id = task.project_id,
                        "Skipping remote task for unknown project"
                    );
                    outcome.tasks_skipped += 1;
                    continue;
                }
                known.insert(task.id);
                tasks.push(task);
                outcome.tasks_added += 1;
            }
            if outcome.tasks_added > 0 {
                self.commit_tasks(&mut state, tasks)?;
            }
        }

        Ok(outcome)
    }
}
