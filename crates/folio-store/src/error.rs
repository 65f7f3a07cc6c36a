//! Error types for store operations.

use thiserror::Error;

use crate::config::ConfigError;

/// A programming-error fault: an invariant the caller was responsible for
/// was violated. Logged at `error` on construction and never swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("bug: {0}")]
pub struct BugIndicatingError(String);

impl BugIndicatingError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "bug-indicating error");
        Self(message)
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Errors from cache, transaction, and store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The record an operation needs is not in the cache.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// A path walks through a value that is not an object.
    #[error("path conflict in {record} at {path:?}")]
    PathConflict { record: String, path: Vec<String> },

    /// Operation arguments have the wrong shape.
    #[error("invalid operation args: {0}")]
    InvalidArgs(String),

    /// The viewer's role does not allow editing.
    #[error("permission denied on {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Bug(#[from] BugIndicatingError),

    #[error(transparent)]
    Text(#[from] folio_text::TextError),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
