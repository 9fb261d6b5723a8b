//! Error types for Parley

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Malformed request: wrong participant count, blank identifiers.
    /// Caller error, surfaced immediately, never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A collaborator (agent invocation, backlog, events sink) was
    /// unreachable or timed out. Recovered by the dispatch loop: state is
    /// left untouched and the work retries next iteration.
    #[error("collaborator unavailable: {service} - {message}")]
    Collaborator { service: String, message: String },

    /// A store invariant was violated (e.g. a session with other than two
    /// participants). Programming-error class, not runtime-recoverable.
    #[error("store corruption: {0}")]
    StoreCorruption(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    pub fn not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound(session_id.into())
    }

    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: message.into(),
        }
    }
}
