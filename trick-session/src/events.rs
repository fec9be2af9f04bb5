//! Session events.
//!
//! Everything the session worker does with an action is published as a
//! [`SessionEvent`] on a broadcast channel and traced at the matching level.

use tracing::{debug, info, warn};
use trick_core::RouterEvent;
use trick_types::{ActionBody, ActionKind, Phase, PlayerId, Sequence};

use crate::catchup::CatchUpReport;

/// Why an admitted or received action is waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferReason {
    /// The current phase does not accept the kind yet.
    Phase(Phase),
    /// Predecessors are missing.
    Gap {
        /// Watermark when the action arrived.
        watermark: Sequence,
    },
}

/// Something observable happened in a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// An action was applied to the game state.
    Applied {
        /// Sequence of the action.
        sequence: Sequence,
        /// Kind of the action.
        kind: ActionKind,
        /// Acting player.
        player: PlayerId,
    },
    /// An action is buffered.
    Buffered {
        /// Sequence of the action.
        sequence: Sequence,
        /// Kind, when known at buffering time.
        kind: Option<ActionKind>,
        /// Why it waits.
        reason: BufferReason,
    },
    /// An action was dropped. Its sequence, if any, stays consumed.
    Dropped {
        /// Sequence, unknown for records that failed to decode.
        sequence: Option<Sequence>,
        /// Kind, unknown for records that failed to decode.
        kind: Option<ActionKind>,
        /// Why it was dropped.
        reason: String,
    },
    /// A redelivered action was ignored.
    Duplicate {
        /// Sequence of the action.
        sequence: Sequence,
    },
    /// The game phase changed.
    PhaseChanged {
        /// Previous phase.
        from: Phase,
        /// New phase.
        to: Phase,
    },
    /// Live delivery skipped ahead of the watermark.
    GapDetected {
        /// Current watermark.
        watermark: Sequence,
        /// Sequences still missing below the highest held one.
        missing: Vec<Sequence>,
    },
    /// A player nudged another.
    Honk {
        /// Sender.
        from: PlayerId,
        /// Player being nudged.
        target: PlayerId,
    },
    /// A player announced they are slow.
    SlowPoke {
        /// Sender.
        player: PlayerId,
    },
    /// A catch-up run started.
    CatchUpStarted {
        /// First requested sequence.
        from: Sequence,
        /// Last requested sequence.
        to: Option<Sequence>,
    },
    /// A catch-up run finished.
    CatchUpFinished {
        /// What it did.
        report: CatchUpReport,
    },
    /// A catch-up run failed.
    CatchUpFailed {
        /// Why.
        reason: String,
    },
}

impl SessionEvent {
    /// Convert a router event, tracing it on the way.
    pub(crate) fn from_router(event: RouterEvent) -> Self {
        match event {
            RouterEvent::Applied {
                sequence,
                kind,
                player,
            } => {
                debug!(%sequence, %kind, %player, "applied");
                SessionEvent::Applied {
                    sequence,
                    kind,
                    player,
                }
            }
            RouterEvent::Parked {
                sequence,
                kind,
                phase,
            } => {
                debug!(%sequence, %kind, %phase, "parked until phase accepts it");
                SessionEvent::Buffered {
                    sequence,
                    kind: Some(kind),
                    reason: BufferReason::Phase(phase),
                }
            }
            RouterEvent::Dropped {
                sequence,
                kind,
                reason,
            } => {
                warn!(%sequence, %kind, %reason, "dropped action");
                SessionEvent::Dropped {
                    sequence: Some(sequence),
                    kind: Some(kind),
                    reason: reason.to_string(),
                }
            }
            RouterEvent::Duplicate { sequence, kind } => {
                debug!(%sequence, %kind, "duplicate ignored");
                SessionEvent::Duplicate { sequence }
            }
            RouterEvent::GapHeld {
                sequence,
                watermark,
            } => {
                debug!(%sequence, %watermark, "held for missing predecessors");
                SessionEvent::Buffered {
                    sequence,
                    kind: None,
                    reason: BufferReason::Gap { watermark },
                }
            }
            RouterEvent::PhaseChanged { from, to } => {
                info!(%from, %to, "phase changed");
                SessionEvent::PhaseChanged { from, to }
            }
            RouterEvent::Signal(action) => match action.body {
                ActionBody::Honk(honk) => {
                    debug!(from = %action.player, target = %honk.target, "honk");
                    SessionEvent::Honk {
                        from: action.player,
                        target: honk.target,
                    }
                }
                _ => {
                    debug!(player = %action.player, "slow poke");
                    SessionEvent::SlowPoke {
                        player: action.player,
                    }
                }
            },
        }
    }

    /// Whether this event reports a gap in live delivery.
    pub fn is_gap(&self) -> bool {
        matches!(
            self,
            SessionEvent::Buffered {
                reason: BufferReason::Gap { .. },
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trick_core::RuleError;
    use trick_types::{Action, Honk, SlowPoke};

    fn seat(n: u8) -> PlayerId {
        PlayerId::new(n).unwrap()
    }

    #[test]
    fn parked_becomes_phase_buffered() {
        let event = SessionEvent::from_router(RouterEvent::Parked {
            sequence: Sequence::new(7),
            kind: ActionKind::PlayCard,
            phase: Phase::Betting,
        });
        assert_eq!(
            event,
            SessionEvent::Buffered {
                sequence: Sequence::new(7),
                kind: Some(ActionKind::PlayCard),
                reason: BufferReason::Phase(Phase::Betting),
            }
        );
        assert!(!event.is_gap());
    }

    #[test]
    fn gap_held_is_a_gap() {
        let event = SessionEvent::from_router(RouterEvent::GapHeld {
            sequence: Sequence::new(9),
            watermark: Sequence::new(6),
        });
        assert!(event.is_gap());
    }

    #[test]
    fn dropped_keeps_the_rule_message() {
        let event = SessionEvent::from_router(RouterEvent::Dropped {
            sequence: Sequence::new(3),
            kind: ActionKind::Dealer,
            reason: RuleError::NotSeated(seat(5)).into(),
        });
        match event {
            SessionEvent::Dropped {
                sequence, reason, ..
            } => {
                assert_eq!(sequence, Some(Sequence::new(3)));
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn signals_become_their_own_events() {
        let honk = Action::new(
            seat(0),
            ActionBody::Honk(Honk { target: seat(2) }),
            0,
            Sequence::UNSEQUENCED,
        );
        assert_eq!(
            SessionEvent::from_router(RouterEvent::Signal(honk)),
            SessionEvent::Honk {
                from: seat(0),
                target: seat(2),
            }
        );

        let slow = Action::new(
            seat(1),
            ActionBody::AmSlowPoke(SlowPoke),
            0,
            Sequence::UNSEQUENCED,
        );
        assert_eq!(
            SessionEvent::from_router(RouterEvent::Signal(slow)),
            SessionEvent::SlowPoke { player: seat(1) }
        );
    }
}
