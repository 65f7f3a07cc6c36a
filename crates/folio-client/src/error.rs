//! Error types for remote calls and request batching.

use thiserror::Error;

use crate::constants::TOKEN_EXPIRED;

/// Errors from the remote service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// An expected, typed failure the caller can act on.
    #[error("remote error {code}: {message}")]
    Domain { code: u32, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote call timed out")]
    Timeout,
}

impl RemoteError {
    pub fn domain(code: u32, message: impl Into<String>) -> Self {
        Self::Domain {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Domain { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_token_expired(&self) -> bool {
        self.code() == Some(TOKEN_EXPIRED)
    }
}

/// Errors delivered to every caller of a failed batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The batch did not answer within the request timeout.
    #[error("request batch timed out")]
    Timeout,

    #[error("request batch rejected: {0}")]
    Rejected(RemoteError),

    /// The remote answered with the wrong number of responses.
    #[error("expected {expected} responses, got {got}")]
    ResponseMismatch { expected: usize, got: usize },

    /// The worker went away before answering.
    #[error("request dropped")]
    Dropped,
}
