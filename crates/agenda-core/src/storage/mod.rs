//! Storage layer - JSON snapshot files behind a single lock
//!
//! # Architecture
//!
//! - `store`: the [`RecordStore`], owner of the project and task collections
//! - `snapshot`: whole-file JSON reads and atomic writes
//!
//! # Usage
//!
//! ```ignore
//! use agenda_core::storage::RecordStore;
//! use agenda_core::model::ProjectColor;
//!
//! let store = RecordStore::open("/tmp/agenda")?;
//! let project = store.create_project("Launch", "", ProjectColor::Blue)?;
//! ```

mod snapshot;
pub mod store;

pub use store::{MergeOutcome, PROJECTS_FILE, RecordStore, StoreStats, TASKS_FILE};

use std::sync::Arc;

use crate::error::{Error, Result};

/// Run a store call on the blocking pool.
///
/// Mutations fsync their snapshot before returning, which must not stall an
/// async worker thread.
pub(crate) async fn run_blocking<T, F>(store: &Arc<RecordStore>, op: F) -> Result<T>
where
    F: FnOnce(&RecordStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| Error::Other(format!("Task join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProjectColor;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_blocking_returns_store_result() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).unwrap());

        let project = run_blocking(&store, |s| s.create_project("Launch", "", ProjectColor::Blue))
            .await
            .unwrap();
        assert_eq!(store.get_project(project.id), Some(project));

        let err = run_blocking(&store, |s| s.create_task(crate::model::NewTask::new("x", 42)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProjectNotFound(42)));
    }
}
