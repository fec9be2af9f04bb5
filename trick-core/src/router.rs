//! Phase-gated action router.
//!
//! The router owns one session's [`GameState`] together with the
//! [`Watermark`], the [`PendingBuffer`] and the [`GapBuffer`]. Every action
//! goes through the same steps:
//!
//! 1. `sequence <= watermark` → duplicate, dropped
//! 2. `sequence > watermark + 1` → held in the gap buffer
//! 3. `sequence == watermark + 1` → admitted: the watermark advances, then
//!    the action is applied if the phase accepts its kind, otherwise parked
//!
//! After every apply the pending buffer is re-scanned and the gap buffer is
//! drained. The router never performs I/O; it reports what happened as
//! [`RouterEvent`]s.

use trick_types::{Action, ActionKind, GameState, Phase, PlayerId, Sequence};

use crate::gap::{GapBuffer, Watermark};
use crate::pending::{PendingBuffer, PendingError, DEFAULT_PENDING_CAPACITY};
use crate::rules::{self, RuleError};
use crate::validity::accepts;

/// Where a sequence stands relative to the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// At or below the watermark.
    Duplicate,
    /// Exactly `watermark + 1`.
    Next,
    /// Beyond `watermark + 1`.
    Ahead,
}

/// Why an admitted action was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DropReason {
    /// The rules refused it.
    #[error(transparent)]
    Rule(#[from] RuleError),
    /// It could not be parked.
    #[error(transparent)]
    Pending(#[from] PendingError),
}

/// Something the router did with an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// Applied to the state.
    Applied {
        /// Sequence of the action.
        sequence: Sequence,
        /// Kind of the action.
        kind: ActionKind,
        /// Acting player.
        player: PlayerId,
    },
    /// Admitted but parked until a later phase accepts it.
    Parked {
        /// Sequence of the action.
        sequence: Sequence,
        /// Kind of the action.
        kind: ActionKind,
        /// Phase that refused it.
        phase: Phase,
    },
    /// Admitted and then dropped; the sequence stays consumed.
    Dropped {
        /// Sequence of the action.
        sequence: Sequence,
        /// Kind of the action.
        kind: ActionKind,
        /// Why it was dropped.
        reason: DropReason,
    },
    /// Already admitted before.
    Duplicate {
        /// Sequence of the action.
        sequence: Sequence,
        /// Kind of the action.
        kind: ActionKind,
    },
    /// Held because predecessors are missing.
    GapHeld {
        /// Sequence of the action.
        sequence: Sequence,
        /// Watermark at the time.
        watermark: Sequence,
    },
    /// The phase changed.
    PhaseChanged {
        /// Previous phase.
        from: Phase,
        /// New phase.
        to: Phase,
    },
    /// An ephemeral signal, passed through untouched.
    Signal(Action),
}

/// Routes actions into one session's game state.
#[derive(Debug, Clone)]
pub struct Router {
    state: GameState,
    watermark: Watermark,
    pending: PendingBuffer,
    gap: GapBuffer,
}

impl Router {
    /// A router for a fresh session.
    pub fn new() -> Self {
        Self::with_pending_capacity(DEFAULT_PENDING_CAPACITY)
    }

    /// A router for a fresh session with a custom pending buffer size.
    pub fn with_pending_capacity(capacity: usize) -> Self {
        Self {
            state: GameState::new(),
            watermark: Watermark::new(),
            pending: PendingBuffer::new(capacity),
            gap: GapBuffer::new(),
        }
    }

    /// Resume from a known state and watermark.
    pub fn from_state(state: GameState, watermark: Watermark) -> Self {
        Self {
            state,
            watermark,
            ..Self::new()
        }
    }

    /// Current game state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Current watermark.
    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Parked actions.
    pub fn pending(&self) -> &PendingBuffer {
        &self.pending
    }

    /// Actions held ahead of the watermark.
    pub fn gap(&self) -> &GapBuffer {
        &self.gap
    }

    /// Sequences known to be missing.
    pub fn missing(&self) -> Vec<Sequence> {
        self.gap.missing(self.watermark)
    }

    /// Classify a sequence against the watermark.
    pub fn classify(&self, sequence: Sequence) -> Admission {
        let next = self.watermark.next();
        if sequence < next {
            Admission::Duplicate
        } else if sequence == next {
            Admission::Next
        } else {
            Admission::Ahead
        }
    }

    /// Route one live action.
    pub fn route(&mut self, action: Action) -> Vec<RouterEvent> {
        let mut events = Vec::new();
        if action.is_ephemeral() {
            events.push(RouterEvent::Signal(action));
            return events;
        }

        match self.classify(action.sequence) {
            Admission::Duplicate => events.push(RouterEvent::Duplicate {
                sequence: action.sequence,
                kind: action.kind(),
            }),
            Admission::Ahead => self.hold(action, &mut events),
            Admission::Next => {
                self.admit(action, &mut events);
                self.drain_gaps(&mut events);
            }
        }
        events
    }

    /// Forget everything and start over at sequence 1.
    pub fn reset(&mut self) {
        self.state = GameState::new();
        self.watermark = Watermark::new();
        self.pending.clear();
        self.gap.clear();
    }

    /// Admit the action at `watermark + 1`.
    pub(crate) fn admit(&mut self, action: Action, events: &mut Vec<RouterEvent>) {
        debug_assert_eq!(action.sequence, self.watermark.next());
        self.watermark.advance(action.sequence);
        // A replayed copy may be admitted while the live copy is still held.
        self.gap.take(action.sequence);

        if accepts(self.state.phase, action.kind()) {
            self.apply_and_release(action, events);
            return;
        }

        let (sequence, kind) = (action.sequence, action.kind());
        match self.pending.insert(action) {
            Ok(()) => events.push(RouterEvent::Parked {
                sequence,
                kind,
                phase: self.state.phase,
            }),
            Err(err) => events.push(RouterEvent::Dropped {
                sequence,
                kind,
                reason: err.into(),
            }),
        }
    }

    /// Hold an action that is ahead of the watermark.
    pub(crate) fn hold(&mut self, action: Action, events: &mut Vec<RouterEvent>) {
        let (sequence, kind) = (action.sequence, action.kind());
        if self.gap.insert(action) {
            events.push(RouterEvent::GapHeld {
                sequence,
                watermark: self.watermark.get(),
            });
        } else {
            events.push(RouterEvent::Duplicate { sequence, kind });
        }
    }

    /// Admit held actions for as long as the next sequence is available.
    ///
    /// Returns how many were admitted.
    pub(crate) fn drain_gaps(&mut self, events: &mut Vec<RouterEvent>) -> usize {
        let mut drained = 0;
        while let Some(action) = self.gap.take(self.watermark.next()) {
            self.admit(action, events);
            drained += 1;
        }
        drained
    }

    fn apply_and_release(&mut self, action: Action, events: &mut Vec<RouterEvent>) {
        let mut next = Some(action);
        while let Some(action) = next {
            self.apply_one(&action, events);
            next = self.pending.pop_ready(self.state.phase);
        }
    }

    fn apply_one(&mut self, action: &Action, events: &mut Vec<RouterEvent>) {
        let from = self.state.phase;
        match rules::apply(&mut self.state, action) {
            Ok(()) => {
                events.push(RouterEvent::Applied {
                    sequence: action.sequence,
                    kind: action.kind(),
                    player: action.player,
                });
                if self.state.phase != from {
                    events.push(RouterEvent::PhaseChanged {
                        from,
                        to: self.state.phase,
                    });
                }
            }
            Err(err) => events.push(RouterEvent::Dropped {
                sequence: action.sequence,
                kind: action.kind(),
                reason: err.into(),
            }),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
