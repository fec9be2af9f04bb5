//! Error types for the action log.

use std::path::PathBuf;

use trick_types::{ActionKind, Sequence, SessionId};

/// SQLite primary result codes that mean "try again".
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Action log errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The counter transaction lost a race. Retryable.
    #[error("sequence allocation conflict for session {session}")]
    Conflict {
        /// The session whose counter was contended.
        session: SessionId,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The sequence already holds a different action.
    #[error("sequence {sequence} already holds a different action")]
    SequenceTaken {
        /// The contested sequence.
        sequence: Sequence,
    },

    /// Ephemeral kinds are never logged.
    #[error("{0} actions are ephemeral and never logged")]
    Ephemeral(ActionKind),

    /// A stored row could not be turned back into a record.
    #[error("corrupt row at sequence {sequence}: {reason}")]
    Corrupt {
        /// Sequence of the row.
        sequence: i64,
        /// What was wrong with it.
        reason: String,
    },

    /// The log refused service (used by test doubles).
    #[error("log unavailable: {0}")]
    Unavailable(String),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

impl LogError {
    /// Map a sqlx error, classifying busy/locked databases as conflicts.
    pub(crate) fn from_sqlx(session: SessionId, err: sqlx::Error) -> Self {
        let contended = match &err {
            sqlx::Error::PoolTimedOut => true,
            sqlx::Error::Database(db) => db
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
            _ => false,
        };
        if contended {
            LogError::Conflict { session }
        } else {
            LogError::Database(err)
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LogError::Conflict { .. })
    }
}
