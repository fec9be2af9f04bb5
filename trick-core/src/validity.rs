//! Static phase validity table.
//!
//! Each authoritative kind is accepted in a fixed set of phases. An action
//! whose kind is not accepted by the current phase is parked until a later
//! phase accepts it. Ephemeral kinds are accepted everywhere because they
//! never reach the state machine.

use trick_types::{ActionKind, Phase};

const ALL_PHASES: &[Phase] = &[
    Phase::AwaitingNewGame,
    Phase::Dealing,
    Phase::Betting,
    Phase::ChoosingTrump,
    Phase::Discarding,
    Phase::Playing,
    Phase::Scoring,
];

/// Phases that accept the given kind.
pub fn phases_for(kind: ActionKind) -> &'static [Phase] {
    match kind {
        ActionKind::StartNewGame => &[Phase::AwaitingNewGame, Phase::Scoring],
        ActionKind::PlayOrder => &[Phase::Dealing],
        ActionKind::Dealer => &[Phase::Dealing, Phase::Scoring],
        ActionKind::SendDeck => &[Phase::Dealing],
        ActionKind::ChoseBet => &[Phase::Betting],
        ActionKind::ChoseTrump => &[Phase::ChoosingTrump],
        ActionKind::CancelTrump | ActionKind::Discard => &[Phase::Discarding],
        ActionKind::PlayCard => &[Phase::Playing],
        ActionKind::SendState | ActionKind::AmSlowPoke | ActionKind::Honk => ALL_PHASES,
    }
}

/// Whether `phase` accepts actions of `kind`.
pub fn accepts(phase: Phase, kind: ActionKind) -> bool {
    phases_for(kind).contains(&phase)
}
