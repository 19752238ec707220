//! Error types for sync-backend.

use crate::link::LinkError;

/// Main error type for sync-backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Output schedule could not be built.
    #[error("schedule error: {0}")]
    Schedule(#[from] ventsync_core::ScheduleError),

    /// Event log could not be built.
    #[error("event log error: {0}")]
    List(#[from] ventsync_core::ListError),

    /// Link error.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
