//! Authoritative game state.
//!
//! [`GameState`] is plain data. It lives in this crate because it travels on
//! the wire inside `sendState` snapshots; the rules that mutate it live in
//! trick-core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Card, PlayerId, Suit};

/// Phase of the game state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Phase {
    /// No game in progress.
    #[default]
    AwaitingNewGame,
    /// Seating, dealer selection and the deal.
    Dealing,
    /// Players submit bets.
    Betting,
    /// The declarer names trump.
    ChoosingTrump,
    /// The declarer discards down after taking the kitty.
    Discarding,
    /// Tricks are played.
    Playing,
    /// Round scored, waiting for the next dealer or a new game.
    Scoring,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::AwaitingNewGame => "awaiting-new-game",
            Phase::Dealing => "dealing",
            Phase::Betting => "betting",
            Phase::ChoosingTrump => "choosing-trump",
            Phase::Discarding => "discarding",
            Phase::Playing => "playing",
            Phase::Scoring => "scoring",
        };
        f.write_str(name)
    }
}

/// How the trump suit of a round is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TrumpMode {
    /// The highest bettor names trump, takes the kitty and discards.
    #[default]
    Declared,
    /// The top kitty card is turned up and sets trump; betting leads
    /// straight into play.
    TurnUp,
}

/// One trick, in progress or completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Trick {
    /// Cards in play order.
    pub plays: Vec<(PlayerId, Card)>,
    /// Set once every seated player has played.
    pub winner: Option<PlayerId>,
}

impl Trick {
    /// Suit of the first card played, if any.
    pub fn led_suit(&self) -> Option<Suit> {
        self.plays.first().map(|(_, card)| card.suit)
    }

    /// Whether the given player already contributed a card.
    pub fn has_played(&self, player: PlayerId) -> bool {
        self.plays.iter().any(|(p, _)| *p == player)
    }
}

/// The authoritative per-session state.
///
/// Two peers that applied the same actions in the same sequence order hold
/// equal `GameState` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GameState {
    /// Current phase.
    pub phase: Phase,
    /// Rounds in this game, set by `startNewGame`.
    pub rounds_total: u8,
    /// Trump rule for this game, set by `startNewGame`.
    pub trump_mode: TrumpMode,
    /// Current round, 1-based once the first deck is dealt.
    pub round: u8,
    /// Seated players in play order.
    pub play_order: Vec<PlayerId>,
    /// Dealer of the current round.
    pub dealer: Option<PlayerId>,
    /// Cards held by each player.
    pub hands: BTreeMap<PlayerId, Vec<Card>>,
    /// Undealt cards, taken by the declarer when trump is named.
    pub kitty: Vec<Card>,
    /// Bets submitted this round.
    pub bets: BTreeMap<PlayerId, u8>,
    /// Highest bettor of the round.
    pub declarer: Option<PlayerId>,
    /// Trump suit named by the declarer.
    pub trump: Option<Suit>,
    /// Trick being played.
    pub current_trick: Trick,
    /// Completed tricks this round.
    pub tricks: Vec<Trick>,
    /// Tricks taken this round.
    pub tricks_won: BTreeMap<PlayerId, u8>,
    /// Player expected to act next while playing.
    pub turn: Option<PlayerId>,
    /// Cumulative scores.
    pub scores: BTreeMap<PlayerId, i32>,
}

impl GameState {
    /// A fresh state awaiting a new game.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seated players.
    pub fn players(&self) -> &[PlayerId] {
        &self.play_order
    }

    /// Whether the player is seated.
    pub fn is_seated(&self, player: PlayerId) -> bool {
        self.play_order.contains(&player)
    }

    /// The seat after `player` in play order, wrapping around.
    pub fn next_after(&self, player: PlayerId) -> Option<PlayerId> {
        let idx = self.play_order.iter().position(|p| *p == player)?;
        self.play_order
            .get((idx + 1) % self.play_order.len())
            .copied()
    }

    /// Play order rotated to start left of the dealer.
    pub fn order_from_dealer(&self) -> Vec<PlayerId> {
        let Some(first) = self.dealer.and_then(|d| self.next_after(d)) else {
            return self.play_order.clone();
        };
        let start = self
            .play_order
            .iter()
            .position(|p| *p == first)
            .unwrap_or(0);
        let mut order = self.play_order.clone();
        order.rotate_left(start);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(seat: u8) -> PlayerId {
        PlayerId::new(seat).unwrap()
    }

    #[test]
    fn default_state_awaits_new_game() {
        let state = GameState::new();
        assert_eq!(state.phase, Phase::AwaitingNewGame);
        assert!(state.players().is_empty());
    }

    #[test]
    fn next_after_wraps() {
        let state = GameState {
            play_order: vec![p(2), p(0), p(1)],
            ..GameState::default()
        };
        assert_eq!(state.next_after(p(2)), Some(p(0)));
        assert_eq!(state.next_after(p(1)), Some(p(2)));
        assert_eq!(state.next_after(p(4)), None);
    }

    #[test]
    fn order_from_dealer_starts_left_of_dealer() {
        let state = GameState {
            play_order: vec![p(0), p(1), p(2)],
            dealer: Some(p(1)),
            ..GameState::default()
        };
        assert_eq!(state.order_from_dealer(), vec![p(2), p(0), p(1)]);
    }

    #[test]
    fn state_snapshot_roundtrips_through_msgpack() {
        let mut state = GameState {
            phase: Phase::Betting,
            play_order: vec![p(0), p(1)],
            ..GameState::default()
        };
        state.bets.insert(p(0), 2);
        let bytes = rmp_serde::to_vec(&state).unwrap();
        let restored: GameState = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(state, restored);
    }

    #[test]
    fn state_serializes_to_json() {
        let state = GameState::new();
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("AwaitingNewGame"));
    }
}
