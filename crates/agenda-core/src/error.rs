//! Error types for Agenda

use thiserror::Error;

use crate::model::RecordId;

/// Result type alias using Agenda's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Agenda error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Project '{0}' not found. Run `agenda projects list` to see all projects.")]
    ProjectNotFound(RecordId),

    #[error("Task '{0}' not found. Run `agenda tasks list` to see all tasks.")]
    TaskNotFound(RecordId),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Remote store answered with HTTP {0}")]
    RemoteStatus(u16),

    #[error("Malformed response from remote store: {0}")]
    MalformedResponse(String),

    #[error("Remote store reported an error: {0}")]
    RemoteError(String),

    #[error("Remote sync is not configured. Set `sync.base_url` or the AGENDA_SYNC_URL environment variable.")]
    SyncNotConfigured,

    // Persistence errors (E400-E499)
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Scheduler errors (E500-E599)
    #[error("Scheduler error: {0}")]
    SchedulerState(String),

    #[error("Notification delivery failed: {0}")]
    NotificationFailed(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProjectNotFound(_) => "E001",
            Self::TaskNotFound(_) => "E002",
            Self::NetworkError(_) => "E100",
            Self::RemoteStatus(_) => "E101",
            Self::MalformedResponse(_) => "E102",
            Self::SyncNotConfigured => "E103",
            Self::RemoteError(_) => "E104",
            Self::PersistenceError(_) => "E400",
            Self::Serialization(_) => "E401",
            Self::SchedulerState(_) => "E500",
            Self::NotificationFailed(_) => "E501",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ProjectNotFound(_) => Some("agenda projects list".to_string()),
            Self::TaskNotFound(_) => Some("agenda tasks list".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::SyncNotConfigured => Some("agenda config set sync.base_url <url>".to_string()),
            Self::RemoteStatus(_) => Some("agenda sync status".to_string()),
            _ => None,
        }
    }

    /// Whether this error came from talking to the remote store
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::RemoteStatus(_)
                | Self::MalformedResponse(_)
                | Self::RemoteError(_)
                | Self::SyncNotConfigured
        )
    }
}
