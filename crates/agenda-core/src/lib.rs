//! Agenda Core Library
//!
//! This crate provides the core functionality for Agenda, including:
//! - Record store (projects and tasks in local JSON snapshots)
//! - Remote store client (HTTP, query-path routed)
//! - Additive pull/push sync
//! - Reminder notification scheduler
//! - Configuration and input validation

pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod storage;
pub mod sync;
pub mod validation;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::model::{NewTask, Priority, Project, ProjectColor, RecordId, Task, TaskUpdate};
    pub use crate::notify::{Notification, NotificationScheduler, Notifier};
    pub use crate::storage::RecordStore;
    pub use crate::sync::{RemoteStore, SyncClient, SyncCoordinator};
}
