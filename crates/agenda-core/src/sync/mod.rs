//! Manual synchronization with the remote spreadsheet store
//!
//! - `client`: the [`RemoteStore`] transport trait and its HTTP implementation
//! - `coordinator`: additive pull/push on top of a [`RecordStore`](crate::storage::RecordStore)

pub mod client;
pub mod coordinator;

pub use client::{RemoteStore, SyncClient, SyncClientBuilder};
pub use coordinator::{PullReport, PushReport, SyncCoordinator, SyncFailure, SyncStage};
