//! Sequence contiguity tracking for Trickline.
//!
//! This module provides:
//! - [`Watermark`]: the highest sequence admitted locally, never decreasing
//! - [`GapBuffer`]: actions that arrived ahead of `Watermark + 1`
//!
//! Sequences are allocated by the log's counter, so every number between the
//! watermark and the highest buffered sequence exists somewhere. The gap
//! buffer tells the session which ones it has not seen yet.

use std::collections::BTreeMap;

use trick_types::{Action, Sequence};

/// Highest sequence admitted locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Watermark(Sequence);

impl Watermark {
    /// A watermark where nothing has been admitted.
    pub fn new() -> Self {
        Self(Sequence::zero())
    }

    /// Start at a known sequence, e.g. after restoring a snapshot.
    pub fn at(sequence: Sequence) -> Self {
        Self(sequence)
    }

    /// Current value.
    pub fn get(&self) -> Sequence {
        self.0
    }

    /// The only sequence that may be admitted next.
    pub fn next(&self) -> Sequence {
        self.0.next()
    }

    /// Raise the watermark. Lower values are ignored.
    pub fn advance(&mut self, sequence: Sequence) {
        if sequence > self.0 {
            self.0 = sequence;
        }
    }
}

/// Actions held until their predecessors are admitted.
#[derive(Debug, Clone, Default)]
pub struct GapBuffer {
    buffered: BTreeMap<Sequence, Action>,
}

impl GapBuffer {
    /// Maximum gap size before we stop enumerating missing sequences.
    /// Prevents OOM if a peer sends an absurd sequence jump.
    const MAX_GAP: u64 = 10_000;

    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold an action. Returns `false` if its sequence was already held.
    pub fn insert(&mut self, action: Action) -> bool {
        if self.buffered.contains_key(&action.sequence) {
            return false;
        }
        self.buffered.insert(action.sequence, action);
        true
    }

    /// Take the action at exactly `sequence`, if held.
    pub fn take(&mut self, sequence: Sequence) -> Option<Action> {
        self.buffered.remove(&sequence)
    }

    /// Drop everything at or below the watermark.
    ///
    /// Used after a snapshot or replay moved the watermark past buffered
    /// entries.
    pub fn discard_through(&mut self, watermark: Watermark) {
        self.buffered.retain(|seq, _| *seq > watermark.get());
    }

    /// Lowest held sequence.
    pub fn first(&self) -> Option<Sequence> {
        self.buffered.keys().next().copied()
    }

    /// Highest held sequence.
    pub fn last(&self) -> Option<Sequence> {
        self.buffered.keys().next_back().copied()
    }

    /// Whether anything is held.
    pub fn has_gaps(&self) -> bool {
        !self.buffered.is_empty()
    }

    /// Number of held actions.
    pub fn len(&self) -> usize {
        self.buffered.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }

    /// Sequences between the watermark and the highest held entry that have
    /// not arrived.
    ///
    /// Returns empty if the gap exceeds `MAX_GAP`.
    pub fn missing(&self, watermark: Watermark) -> Vec<Sequence> {
        let Some(max_held) = self.last() else {
            return Vec::new();
        };
        let low = watermark.get().value();
        if max_held.value().saturating_sub(low) > Self::MAX_GAP {
            return Vec::new();
        }

        (low + 1..max_held.value())
            .map(Sequence::new)
            .filter(|seq| !self.buffered.contains_key(seq))
            .collect()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.buffered.clear();
    }
}
