//! Pending buffer for admitted actions that their phase does not accept yet.
//!
//! This module provides a holding area with:
//! - One queue per action kind, preserving arrival order per kind
//! - Release of the lowest-sequence entry the current phase accepts
//! - A max size limit to prevent unbounded memory growth
//!
//! Entries enter the buffer only after admission, so each sequence appears
//! at most once and the buffer owns the action until it is applied.

use std::collections::BTreeMap;

use trick_types::{Action, ActionKind, Phase, Sequence};

use crate::validity::accepts;

/// Default number of actions the buffer holds.
pub const DEFAULT_PENDING_CAPACITY: usize = 1024;

/// Error type for pending buffer operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PendingError {
    /// Buffer is at capacity.
    #[error("pending buffer full (capacity: {capacity})")]
    Full {
        /// Current buffer capacity.
        capacity: usize,
    },

    /// The sequence is already parked.
    #[error("sequence {0} is already pending")]
    Duplicate(Sequence),
}

/// Actions waiting for a phase that accepts them.
#[derive(Debug, Clone)]
pub struct PendingBuffer {
    /// Maximum number of parked actions across all kinds.
    max_size: usize,
    /// Parked actions, per kind in arrival order.
    by_kind: BTreeMap<ActionKind, Vec<Action>>,
    /// Total parked actions.
    len: usize,
}

impl PendingBuffer {
    /// Create a new buffer with the given maximum size.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            by_kind: BTreeMap::new(),
            len: 0,
        }
    }

    /// Park an action.
    ///
    /// Returns an error if the buffer is full or the sequence is already
    /// parked.
    pub fn insert(&mut self, action: Action) -> Result<(), PendingError> {
        if self.contains(action.sequence) {
            return Err(PendingError::Duplicate(action.sequence));
        }
        if self.len >= self.max_size {
            return Err(PendingError::Full {
                capacity: self.max_size,
            });
        }
        self.by_kind.entry(action.kind()).or_default().push(action);
        self.len += 1;
        Ok(())
    }

    /// Remove and return the lowest-sequence action `phase` accepts.
    ///
    /// Callers apply the returned action and ask again: a phase change can
    /// make a different kind eligible.
    pub fn pop_ready(&mut self, phase: Phase) -> Option<Action> {
        let (kind, idx) = self
            .by_kind
            .iter()
            .filter(|(kind, _)| accepts(phase, **kind))
            .flat_map(|(kind, queue)| {
                queue
                    .iter()
                    .enumerate()
                    .map(move |(idx, action)| (action.sequence, *kind, idx))
            })
            .min()
            .map(|(_, kind, idx)| (kind, idx))?;

        let queue = self.by_kind.get_mut(&kind)?;
        let action = queue.remove(idx);
        if queue.is_empty() {
            self.by_kind.remove(&kind);
        }
        self.len -= 1;
        Some(action)
    }

    /// Whether the sequence is parked.
    pub fn contains(&self, sequence: Sequence) -> bool {
        self.by_kind
            .values()
            .flatten()
            .any(|action| action.sequence == sequence)
    }

    /// Parked actions of one kind, in arrival order.
    pub fn queued(&self, kind: ActionKind) -> &[Action] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of parked actions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.by_kind.clear();
        self.len = 0;
    }
}

impl Default for PendingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_PENDING_CAPACITY)
    }
}
