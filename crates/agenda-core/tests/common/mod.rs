//! Shared fixtures for the agenda-core integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use agenda_core::model::{Priority, Project, ProjectColor, RecordId, Task};
use agenda_core::sync::RemoteStore;
use agenda_core::{Error, Result};
use async_trait::async_trait;

/// In-memory remote store that can be told to fail
#[derive(Default)]
pub struct FakeRemote {
    pub projects: Mutex<Vec<Project>>,
    pub tasks: Mutex<Vec<Task>>,
    pub pushed_projects: Mutex<Vec<RecordId>>,
    pub pushed_tasks: Mutex<Vec<RecordId>>,
    pub fail_fetch_projects: AtomicBool,
    pub fail_fetch_tasks: AtomicBool,
    pub reject_task_ids: Mutex<HashSet<RecordId>>,
    /// Held inside every call, to widen interleaving windows
    pub latency: Option<Duration>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeRemote {
    pub fn with_records(projects: Vec<Project>, tasks: Vec<Task>) -> Self {
        Self {
            projects: Mutex::new(projects),
            tasks: Mutex::new(tasks),
            ..Default::default()
        }
    }

    pub fn pushed_project_ids(&self) -> Vec<RecordId> {
        self.pushed_projects.lock().unwrap().clone()
    }

    pub fn pushed_task_ids(&self) -> Vec<RecordId> {
        self.pushed_tasks.lock().unwrap().clone()
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn fetch_projects(&self) -> Result<Vec<Project>> {
        self.enter().await;
        let result = if self.fail_fetch_projects.load(Ordering::SeqCst) {
            Err(Error::RemoteStatus(500))
        } else {
            Ok(self.projects.lock().unwrap().clone())
        };
        self.leave();
        result
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>> {
        self.enter().await;
        let result = if self.fail_fetch_tasks.load(Ordering::SeqCst) {
            Err(Error::MalformedResponse("missing tasks array".to_string()))
        } else {
            Ok(self.tasks.lock().unwrap().clone())
        };
        self.leave();
        result
    }

    async fn push_project(&self, project: &Project) -> Result<()> {
        self.enter().await;
        self.pushed_projects.lock().unwrap().push(project.id);
        self.projects.lock().unwrap().push(project.clone());
        self.leave();
        Ok(())
    }

    async fn push_task(&self, task: &Task) -> Result<()> {
        self.enter().await;
        let result = if self.reject_task_ids.lock().unwrap().contains(&task.id) {
            Err(Error::RemoteStatus(400))
        } else {
            self.pushed_tasks.lock().unwrap().push(task.id);
            self.tasks.lock().unwrap().push(task.clone());
            Ok(())
        };
        self.leave();
        result
    }
}

pub fn project(id: RecordId, name: &str) -> Project {
    Project {
        id,
        name: name.to_string(),
        description: String::new(),
        color: ProjectColor::Blue,
        created_at: "2025-01-01 09:00".to_string(),
    }
}

pub fn task(id: RecordId, project_id: RecordId, title: &str) -> Task {
    Task {
        id,
        title: title.to_string(),
        description: String::new(),
        created_at: "2025-01-01 09:00".to_string(),
        project_id,
        completed: false,
        scheduled_at: None,
        notified: false,
        priority: Priority::Medium,
    }
}
