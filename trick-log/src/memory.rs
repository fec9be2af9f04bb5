//! In-memory action log for testing.
//!
//! Behaves like the SQLite log and adds fault injection: failing appends and
//! range fetches, allocation conflicts, unreadable rows and shuffled range
//! results.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use trick_types::{Sequence, SessionId, WireAction};

use crate::{ActionLog, CorruptRow, LogError, RangeBatch};

/// In-memory action log.
///
/// Clones share the same storage, so a test can keep a handle for
/// inspection and fault injection while a session owns another.
#[derive(Debug, Default, Clone)]
pub struct MemoryActionLog {
    inner: Arc<Mutex<MemoryLogInner>>,
}

#[derive(Debug, Default)]
struct MemoryLogInner {
    actions: BTreeMap<(SessionId, Sequence), WireAction>,
    corrupt: BTreeMap<(SessionId, Sequence), String>,
    counters: HashMap<SessionId, u64>,
    fail_next_append: Option<String>,
    fail_next_range: Option<String>,
    fail_next_allocation: Option<String>,
    pending_conflicts: u32,
    shuffle_ranges: bool,
    appends: usize,
}

impl MemoryActionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryLogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cause the next `append()` to fail with the given error.
    pub fn fail_next_append(&self, error: &str) {
        self.lock().fail_next_append = Some(error.to_string());
    }

    /// Cause the next `range()` to fail with the given error.
    pub fn fail_next_range(&self, error: &str) {
        self.lock().fail_next_range = Some(error.to_string());
    }

    /// Cause the next allocation to fail as an infrastructure error.
    pub fn fail_next_allocation(&self, error: &str) {
        self.lock().fail_next_allocation = Some(error.to_string());
    }

    /// Make the next `count` allocations fail with a conflict.
    pub fn conflict_next_allocations(&self, count: u32) {
        self.lock().pending_conflicts = count;
    }

    /// Return `range()` results in random order.
    pub fn shuffle_ranges(&self, enabled: bool) {
        self.lock().shuffle_ranges = enabled;
    }

    /// Store a record directly, bypassing fault injection.
    pub fn seed(&self, session: SessionId, action: WireAction) {
        self.lock()
            .actions
            .insert((session, action.sequence), action);
    }

    /// Store a row that `range()` reports as unreadable.
    pub fn seed_corrupt(&self, session: SessionId, sequence: Sequence, reason: &str) {
        self.lock()
            .corrupt
            .insert((session, sequence), reason.to_string());
    }

    /// Number of stored actions for the session.
    pub fn len(&self, session: SessionId) -> usize {
        self.lock()
            .actions
            .keys()
            .filter(|(s, _)| *s == session)
            .count()
    }

    /// Whether the session has no stored actions.
    pub fn is_empty(&self, session: SessionId) -> bool {
        self.len(session) == 0
    }

    /// Successful appends so far, across sessions.
    pub fn append_count(&self) -> usize {
        self.lock().appends
    }
}

#[async_trait]
impl ActionLog for MemoryActionLog {
    async fn append(&self, session: SessionId, action: &WireAction) -> Result<(), LogError> {
        let mut inner = self.lock();

        if let Some(error) = inner.fail_next_append.take() {
            return Err(LogError::Unavailable(error));
        }
        if action.kind.is_ephemeral() {
            return Err(LogError::Ephemeral(action.kind));
        }

        let key = (session, action.sequence);
        if let Some(existing) = inner.actions.get(&key) {
            return if existing == action {
                Ok(())
            } else {
                Err(LogError::SequenceTaken {
                    sequence: action.sequence,
                })
            };
        }
        inner.actions.insert(key, action.clone());
        inner.appends += 1;
        Ok(())
    }

    async fn range(
        &self,
        session: SessionId,
        from: Sequence,
        to: Option<Sequence>,
    ) -> Result<RangeBatch, LogError> {
        let mut inner = self.lock();

        if let Some(error) = inner.fail_next_range.take() {
            return Err(LogError::Unavailable(error));
        }

        let wanted = |(s, seq): &(SessionId, Sequence)| {
            *s == session && *seq >= from && to.map_or(true, |to| *seq <= to)
        };
        let mut records: Vec<WireAction> = inner
            .actions
            .iter()
            .filter(|(key, _)| wanted(*key))
            .map(|(_, action)| action.clone())
            .collect();
        let corrupt = inner
            .corrupt
            .iter()
            .filter(|(key, _)| wanted(*key))
            .map(|((_, sequence), reason)| CorruptRow {
                sequence: Some(*sequence),
                reason: reason.clone(),
            })
            .collect();

        if inner.shuffle_ranges {
            records.shuffle(&mut rand::thread_rng());
        }
        Ok(RangeBatch { records, corrupt })
    }

    async fn allocate_next_sequence(&self, session: SessionId) -> Result<Sequence, LogError> {
        let mut inner = self.lock();

        if let Some(error) = inner.fail_next_allocation.take() {
            return Err(LogError::Unavailable(error));
        }
        if inner.pending_conflicts > 0 {
            inner.pending_conflicts -= 1;
            return Err(LogError::Conflict { session });
        }

        let counter = inner.counters.entry(session).or_insert(0);
        *counter += 1;
        Ok(Sequence::new(*counter))
    }

    async fn reset_sequence(&self, session: SessionId) -> Result<(), LogError> {
        self.lock().counters.remove(&session);
        Ok(())
    }

    async fn delete_all(&self, session: SessionId, batch_size: u32) -> Result<u64, LogError> {
        let mut inner = self.lock();
        let mut total = 0u64;
        loop {
            let batch: Vec<_> = inner
                .actions
                .keys()
                .filter(|(s, _)| *s == session)
                .take(batch_size.max(1) as usize)
                .copied()
                .collect();
            if batch.is_empty() {
                break;
            }
            for key in &batch {
                inner.actions.remove(key);
            }
            total += batch.len() as u64;
        }
        let before = inner.corrupt.len();
        inner.corrupt.retain(|(s, _), _| *s != session);
        total += (before - inner.corrupt.len()) as u64;
        Ok(total)
    }
}
