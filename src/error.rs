//! Unified error handling for the run tracker.
//!
//! One error type covers the state machine, the session store and the
//! tracker's background tasks. Degenerate metric inputs are never errors;
//! the metric functions return zero instead.

use thiserror::Error;

use crate::session::RunSession;

/// Unified error type for tracker and store operations.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// `start()` was called while a session is running or paused
    #[error("A run session is already active")]
    AlreadyActive,

    /// `stop()` was called while idle
    #[error("No run session is active")]
    NotActive,

    /// Session id not present in the store
    #[error("Session '{id}' not found")]
    NotFound { id: String },

    /// Persistence/storage error
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Route blob could not be encoded or decoded
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// The session was stopped but could not be saved.
    ///
    /// The finished session is carried along so the caller can retry with
    /// [`crate::store::SessionStore::append`].
    #[error("Failed to save session '{}': {message}", .session.id)]
    SaveFailed {
        session: Box<RunSession>,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A blocking or background task panicked or was cancelled
    #[error("Background task failed: {message}")]
    TaskFailed { message: String },
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for TrackerError {
    fn from(err: tokio::task::JoinError) -> Self {
        TrackerError::TaskFailed {
            message: err.to_string(),
        }
    }
}

/// Extension trait for converting Option to TrackerError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a not-found error for `id`.
    fn ok_or_not_found(self, id: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, id: &str) -> Result<T> {
        self.ok_or_else(|| TrackerError::NotFound { id: id.to_string() })
    }
}
