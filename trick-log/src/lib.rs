//! # trick-log
//!
//! The durable, queryable record of every sequenced action, plus the
//! per-session sequence counter.
//!
//! Two backends implement [`ActionLog`]:
//! - [`SqliteActionLog`]: sqlx over SQLite in WAL mode
//! - [`MemoryActionLog`]: in-process, with fault injection for tests
//!
//! The log stores [`WireAction`] records as received. Decoding into typed
//! actions happens in the session, at the same boundary as live delivery.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod memory;
mod sqlite;

pub use error::LogError;
pub use memory::MemoryActionLog;
pub use sqlite::SqliteActionLog;

use async_trait::async_trait;
use trick_types::{Sequence, SessionId, WireAction};

/// Default number of rows removed per `delete_all` batch.
pub const DEFAULT_DELETE_BATCH: u32 = 500;

/// Records returned by [`ActionLog::range`], in no particular order.
///
/// A stored row that cannot be read back is reported in `corrupt` and the
/// rest of the range is still returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeBatch {
    /// Readable records.
    pub records: Vec<WireAction>,
    /// Rows skipped as unreadable.
    pub corrupt: Vec<CorruptRow>,
}

impl RangeBatch {
    /// Rows in the range, readable or not.
    pub fn len(&self) -> usize {
        self.records.len() + self.corrupt.len()
    }

    /// Whether the range held no rows at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.corrupt.is_empty()
    }
}

impl From<Vec<WireAction>> for RangeBatch {
    fn from(records: Vec<WireAction>) -> Self {
        Self {
            records,
            corrupt: Vec::new(),
        }
    }
}

/// A stored row that could not be turned back into a [`WireAction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptRow {
    /// Sequence of the row, if it is a valid one.
    pub sequence: Option<Sequence>,
    /// What was wrong with it.
    pub reason: String,
}

/// Durable store of past actions.
///
/// `range` gives no ordering guarantee; callers sort.
#[async_trait]
pub trait ActionLog: Send + Sync {
    /// Store one sequenced action.
    ///
    /// Appending the same record twice is a no-op. Appending a different
    /// record under a taken sequence fails with [`LogError::SequenceTaken`].
    async fn append(&self, session: SessionId, action: &WireAction) -> Result<(), LogError>;

    /// Actions with `from <= sequence <= to`, or `from <= sequence` when `to`
    /// is `None`.
    ///
    /// Fails only when the fetch itself fails; unreadable rows are reported
    /// in [`RangeBatch::corrupt`].
    async fn range(
        &self,
        session: SessionId,
        from: Sequence,
        to: Option<Sequence>,
    ) -> Result<RangeBatch, LogError>;

    /// Atomically allocate the next sequence for the session, starting at 1.
    ///
    /// Fails with [`LogError::Conflict`] when the transaction lost a race.
    async fn allocate_next_sequence(&self, session: SessionId) -> Result<Sequence, LogError>;

    /// Reset the counter so the next allocation returns 1.
    async fn reset_sequence(&self, session: SessionId) -> Result<(), LogError>;

    /// Delete every action of the session, `batch_size` rows at a time.
    ///
    /// Returns the number of actions deleted.
    async fn delete_all(&self, session: SessionId, batch_size: u32) -> Result<u64, LogError>;
}
