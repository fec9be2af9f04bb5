//! Error types for trick-session.

use thiserror::Error;
use trick_log::LogError;
use trick_types::{SessionId, WireError};

/// Sequence allocation failed. Nothing was sequenced or broadcast.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Every attempt lost the counter race.
    #[error("sequence allocation for session {session} still conflicted after {attempts} attempts")]
    Conflict {
        /// Session whose counter was contended.
        session: SessionId,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// The log failed for a reason other than contention.
    #[error("sequence allocation failed: {0}")]
    Infrastructure(#[source] LogError),
}

impl AllocationError {
    /// Whether the caller may retry the send as is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AllocationError::Conflict { .. })
    }
}

/// Catch-up failed. The watermark stays where the last pass left it.
#[derive(Debug, Error)]
pub enum CatchUpError {
    /// Another catch-up holds the guard.
    #[error("catch-up already in progress")]
    Busy,

    /// The range fetch failed.
    #[error("catch-up fetch failed: {0}")]
    Fetch(#[source] LogError),

    /// The session worker has stopped.
    #[error("session closed")]
    Closed,
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Sequence allocation failed.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Catch-up failed.
    #[error(transparent)]
    CatchUp(#[from] CatchUpError),

    /// The action log failed.
    #[error("action log error: {0}")]
    Log(#[from] LogError),

    /// An action could not be encoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The session worker has stopped.
    #[error("session closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_retryable() {
        let err = AllocationError::Conflict {
            session: SessionId::new(),
            attempts: 6,
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("6 attempts"));

        let err = AllocationError::Infrastructure(LogError::Unavailable("disk".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn session_error_wraps_layers() {
        let err: SessionError = CatchUpError::Busy.into();
        assert_eq!(err.to_string(), "catch-up already in progress");

        let err: SessionError = LogError::Unavailable("offline".into()).into();
        assert!(err.to_string().contains("offline"));
    }
}
