//! Kind handlers for the game state machine.
//!
//! [`apply`] is the only function that mutates a [`GameState`]. Each handler
//! validates first and mutates second, so a rejected action leaves the state
//! untouched. Rules are deliberately thin: they keep the state consistent
//! (cards come from hands, bets are counted once) but leave turn order and
//! suit following to the front end.

use std::collections::{BTreeMap, BTreeSet};

use trick_types::{
    Action, ActionBody, ActionKind, Card, ChoseBet, ChoseTrump, Dealer, Discard, GameState,
    Phase, PlayCard, PlayOrder, PlayerId, SendDeck, StartNewGame, Suit, Trick, TrumpMode,
    MAX_PLAYERS,
};

use crate::validity::accepts;

/// Why an action was refused by the rules.
///
/// The action is dropped but its sequence stays consumed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The current phase does not accept this kind.
    #[error("{kind} is not accepted while {phase}")]
    WrongPhase {
        /// Kind of the refused action.
        kind: ActionKind,
        /// Phase at the time of the attempt.
        phase: Phase,
    },

    /// Ephemeral signals never reach the state machine.
    #[error("{0} is ephemeral and never changes state")]
    Ephemeral(ActionKind),

    /// A game needs at least one round.
    #[error("a game needs at least one round")]
    NoRounds,

    /// Play order must seat 2 to 6 distinct players.
    #[error("play order must seat 2 to {max} distinct players, got {got:?}")]
    InvalidPlayOrder {
        /// Largest table size.
        max: u8,
        /// The rejected order.
        got: Vec<PlayerId>,
    },

    /// The player is not part of the play order.
    #[error("{0} is not seated")]
    NotSeated(PlayerId),

    /// Deal attempted before play order and dealer are known.
    #[error("cannot deal before play order and dealer are set")]
    NotReadyToDeal,

    /// The deck cannot cover every hand.
    #[error("deck of {deck} cards cannot deal {hand_size} to each of {players} players")]
    DeckTooSmall {
        /// Cards in the deck.
        deck: usize,
        /// Requested hand size.
        hand_size: u8,
        /// Seated players.
        players: usize,
    },

    /// The deck contains the same card twice.
    #[error("deck contains duplicate card {0}")]
    DuplicateCard(Card),

    /// The player already bet this round.
    #[error("{0} already bet this round")]
    AlreadyBet(PlayerId),

    /// Bet larger than the hand.
    #[error("bet {bet} exceeds hand size {hand_size}")]
    BetTooHigh {
        /// Requested bet.
        bet: u8,
        /// Cards per hand.
        hand_size: usize,
    },

    /// Only the declarer may name trump or discard.
    #[error("{player} is not the declarer")]
    NotDeclarer {
        /// Acting player.
        player: PlayerId,
    },

    /// Discard must return exactly as many cards as the kitty held.
    #[error("discard must be exactly {expected} cards, got {got}")]
    DiscardCount {
        /// Kitty size.
        expected: usize,
        /// Cards offered.
        got: usize,
    },

    /// The player does not hold the card.
    #[error("{player} does not hold {card}")]
    CardNotHeld {
        /// Acting player.
        player: PlayerId,
        /// Card that was not found.
        card: Card,
    },

    /// The player already contributed to the current trick.
    #[error("{0} already played in this trick")]
    AlreadyPlayed(PlayerId),
}

/// Apply one action to the state.
///
/// On error the state is unchanged.
pub fn apply(state: &mut GameState, action: &Action) -> Result<(), RuleError> {
    let kind = action.kind();
    if kind.is_ephemeral() {
        return Err(RuleError::Ephemeral(kind));
    }
    if !accepts(state.phase, kind) {
        return Err(RuleError::WrongPhase {
            kind,
            phase: state.phase,
        });
    }

    let player = action.player;
    match &action.body {
        ActionBody::StartNewGame(p) => start_new_game(state, p),
        ActionBody::PlayOrder(p) => play_order(state, p),
        ActionBody::Dealer(p) => dealer(state, p),
        ActionBody::SendDeck(p) => send_deck(state, p),
        ActionBody::ChoseBet(p) => chose_bet(state, player, p),
        ActionBody::ChoseTrump(p) => chose_trump(state, player, p),
        ActionBody::CancelTrump(_) => cancel_trump(state, player),
        ActionBody::Discard(p) => discard(state, player, p),
        ActionBody::PlayCard(p) => play_card(state, player, p),
        ActionBody::SendState(p) => {
            *state = p.state.clone();
            Ok(())
        }
        ActionBody::AmSlowPoke(_) | ActionBody::Honk(_) => Err(RuleError::Ephemeral(kind)),
    }
}

fn start_new_game(state: &mut GameState, p: &StartNewGame) -> Result<(), RuleError> {
    if p.rounds == 0 {
        return Err(RuleError::NoRounds);
    }
    *state = GameState {
        phase: Phase::Dealing,
        rounds_total: p.rounds,
        trump_mode: p.trump_mode,
        ..GameState::default()
    };
    Ok(())
}

fn play_order(state: &mut GameState, p: &PlayOrder) -> Result<(), RuleError> {
    let distinct: BTreeSet<_> = p.order.iter().collect();
    if p.order.len() < 2 || p.order.len() > MAX_PLAYERS as usize || distinct.len() != p.order.len()
    {
        return Err(RuleError::InvalidPlayOrder {
            max: MAX_PLAYERS,
            got: p.order.clone(),
        });
    }

    state.play_order = p.order.clone();
    if state.dealer.is_some_and(|d| !state.is_seated(d)) {
        state.dealer = None;
    }
    state.scores = p.order.iter().map(|&player| (player, 0)).collect();
    clear_round(state);
    Ok(())
}

fn dealer(state: &mut GameState, p: &Dealer) -> Result<(), RuleError> {
    if !state.is_seated(p.dealer) {
        return Err(RuleError::NotSeated(p.dealer));
    }
    state.dealer = Some(p.dealer);
    if state.phase == Phase::Scoring {
        clear_round(state);
        state.phase = Phase::Dealing;
    }
    Ok(())
}

fn send_deck(state: &mut GameState, p: &SendDeck) -> Result<(), RuleError> {
    if state.play_order.is_empty() || state.dealer.is_none() {
        return Err(RuleError::NotReadyToDeal);
    }
    let players = state.play_order.len();
    let needed = players * p.hand_size as usize;
    if p.hand_size == 0 || p.deck.len() < needed {
        return Err(RuleError::DeckTooSmall {
            deck: p.deck.len(),
            hand_size: p.hand_size,
            players,
        });
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = p.deck.iter().find(|card| !seen.insert(**card)) {
        return Err(RuleError::DuplicateCard(*dup));
    }

    clear_round(state);
    let order = state.order_from_dealer();
    let mut cards = p.deck.iter().copied();
    for _ in 0..p.hand_size {
        for player in &order {
            if let Some(card) = cards.next() {
                state.hands.entry(*player).or_default().push(card);
            }
        }
    }
    state.kitty = cards.collect();
    if state.trump_mode == TrumpMode::TurnUp {
        state.trump = state.kitty.first().map(|card| card.suit);
    }
    state.round = state.round.saturating_add(1);
    state.phase = Phase::Betting;
    Ok(())
}

fn chose_bet(state: &mut GameState, player: PlayerId, p: &ChoseBet) -> Result<(), RuleError> {
    if !state.is_seated(player) {
        return Err(RuleError::NotSeated(player));
    }
    if state.bets.contains_key(&player) {
        return Err(RuleError::AlreadyBet(player));
    }
    let hand_size = state.hands.get(&player).map_or(0, Vec::len);
    if p.bet as usize > hand_size {
        return Err(RuleError::BetTooHigh {
            bet: p.bet,
            hand_size,
        });
    }

    state.bets.insert(player, p.bet);
    if state.bets.len() < state.play_order.len() {
        return Ok(());
    }

    let order = state.order_from_dealer();
    let mut declarer: Option<(PlayerId, u8)> = None;
    for seat in &order {
        let bet = state.bets.get(seat).copied().unwrap_or(0);
        if declarer.map_or(true, |(_, best)| bet > best) {
            declarer = Some((*seat, bet));
        }
    }
    state.declarer = declarer.map(|(seat, _)| seat);

    match state.trump_mode {
        TrumpMode::Declared => {
            state.turn = state.declarer;
            state.phase = Phase::ChoosingTrump;
        }
        TrumpMode::TurnUp => {
            state.turn = order.first().copied();
            state.phase = Phase::Playing;
        }
    }
    Ok(())
}

fn chose_trump(state: &mut GameState, player: PlayerId, p: &ChoseTrump) -> Result<(), RuleError> {
    require_declarer(state, player)?;
    state.trump = Some(p.suit);
    let kitty = state.kitty.clone();
    state.hands.entry(player).or_default().extend(kitty);
    state.phase = Phase::Discarding;
    Ok(())
}

fn cancel_trump(state: &mut GameState, player: PlayerId) -> Result<(), RuleError> {
    require_declarer(state, player)?;
    if let Some(hand) = state.hands.get_mut(&player) {
        for card in &state.kitty {
            if let Some(idx) = hand.iter().position(|c| c == card) {
                hand.remove(idx);
            }
        }
    }
    state.trump = None;
    state.phase = Phase::ChoosingTrump;
    Ok(())
}

fn discard(state: &mut GameState, player: PlayerId, p: &Discard) -> Result<(), RuleError> {
    require_declarer(state, player)?;
    if p.cards.len() != state.kitty.len() {
        return Err(RuleError::DiscardCount {
            expected: state.kitty.len(),
            got: p.cards.len(),
        });
    }
    let hand = state.hands.get(&player).cloned().unwrap_or_default();
    let mut remaining = hand;
    for card in &p.cards {
        match remaining.iter().position(|c| c == card) {
            Some(idx) => {
                remaining.remove(idx);
            }
            None => {
                return Err(RuleError::CardNotHeld {
                    player,
                    card: *card,
                })
            }
        }
    }

    state.hands.insert(player, remaining);
    state.kitty = p.cards.clone();
    state.turn = state.order_from_dealer().first().copied();
    state.phase = Phase::Playing;
    Ok(())
}

fn play_card(state: &mut GameState, player: PlayerId, p: &PlayCard) -> Result<(), RuleError> {
    if !state.is_seated(player) {
        return Err(RuleError::NotSeated(player));
    }
    if state.current_trick.has_played(player) {
        return Err(RuleError::AlreadyPlayed(player));
    }
    let idx = state
        .hands
        .get(&player)
        .and_then(|hand| hand.iter().position(|c| *c == p.card))
        .ok_or(RuleError::CardNotHeld {
            player,
            card: p.card,
        })?;

    if let Some(hand) = state.hands.get_mut(&player) {
        hand.remove(idx);
    }
    state.current_trick.plays.push((player, p.card));
    state.turn = state.next_after(player);

    if state.current_trick.plays.len() < state.play_order.len() {
        return Ok(());
    }

    let mut trick = std::mem::take(&mut state.current_trick);
    let winner = trick_winner(&trick, state.trump);
    trick.winner = winner;
    state.tricks.push(trick);
    if let Some(winner) = winner {
        *state.tricks_won.entry(winner).or_default() += 1;
        state.turn = Some(winner);
    }

    if state.hands.values().all(Vec::is_empty) {
        score_round(state);
    }
    Ok(())
}

fn require_declarer(state: &GameState, player: PlayerId) -> Result<(), RuleError> {
    if state.declarer == Some(player) {
        Ok(())
    } else {
        Err(RuleError::NotDeclarer { player })
    }
}

/// Highest trump wins, otherwise the highest card of the led suit.
fn trick_winner(trick: &Trick, trump: Option<Suit>) -> Option<PlayerId> {
    let led = trick.led_suit()?;
    let strength = |card: &Card| {
        let tier = if Some(card.suit) == trump {
            2
        } else if card.suit == led {
            1
        } else {
            0
        };
        (tier, card.rank)
    };
    trick
        .plays
        .iter()
        .fold(None::<&(PlayerId, Card)>, |best, play| match best {
            Some(b) if strength(&b.1) >= strength(&play.1) => Some(b),
            _ => Some(play),
        })
        .map(|(player, _)| *player)
}

fn score_round(state: &mut GameState) {
    for player in state.play_order.clone() {
        let bet = state.bets.get(&player).copied().unwrap_or(0) as i32;
        let won = state.tricks_won.get(&player).copied().unwrap_or(0) as i32;
        let delta = if bet == won { 10 + bet } else { -(bet - won).abs() };
        *state.scores.entry(player).or_default() += delta;
    }
    state.turn = None;
    state.phase = if state.round >= state.rounds_total {
        Phase::AwaitingNewGame
    } else {
        Phase::Scoring
    };
}

fn clear_round(state: &mut GameState) {
    state.hands = BTreeMap::new();
    state.kitty.clear();
    state.bets.clear();
    state.declarer = None;
    state.trump = None;
    state.current_trick = Trick::default();
    state.tricks.clear();
    state.tricks_won = state.play_order.iter().map(|&p| (p, 0)).collect();
    state.turn = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use trick_types::{CancelTrump, Honk, Rank, Sequence};

    fn p(seat: u8) -> PlayerId {
        PlayerId::new(seat).unwrap()
    }

    fn act(player: u8, body: ActionBody) -> Action {
        Action::new(p(player), body, 0, Sequence::new(1))
    }

    fn c(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    /// Two players, dealer P1, dealt from a fixed eight-card deck.
    ///
    /// P2 (left of dealer) receives cards 0, 2, 4; P1 receives 1, 3, 5;
    /// cards 6 and 7 form the kitty.
    fn dealt(mode: TrumpMode) -> GameState {
        let mut state = GameState::new();
        let deck = vec![
            c(Rank::Ace, Suit::Spades),
            c(Rank::King, Suit::Spades),
            c(Rank::Two, Suit::Hearts),
            c(Rank::Three, Suit::Hearts),
            c(Rank::Ten, Suit::Clubs),
            c(Rank::Nine, Suit::Clubs),
            c(Rank::Four, Suit::Diamonds),
            c(Rank::Five, Suit::Diamonds),
        ];
        for action in [
            act(
                0,
                ActionBody::StartNewGame(StartNewGame {
                    rounds: 1,
                    trump_mode: mode,
                }),
            ),
            act(
                0,
                ActionBody::PlayOrder(PlayOrder {
                    order: vec![p(0), p(1)],
                }),
            ),
            act(0, ActionBody::Dealer(Dealer { dealer: p(0) })),
            act(
                0,
                ActionBody::SendDeck(SendDeck {
                    deck,
                    hand_size: 3,
                }),
            ),
        ] {
            apply(&mut state, &action).unwrap();
        }
        state
    }

    #[test]
    fn deal_starts_left_of_dealer() {
        let state = dealt(TrumpMode::Declared);
        assert_eq!(state.phase, Phase::Betting);
        assert_eq!(state.round, 1);
        assert_eq!(state.hands[&p(1)][0], c(Rank::Ace, Suit::Spades));
        assert_eq!(state.hands[&p(0)][0], c(Rank::King, Suit::Spades));
        assert_eq!(state.kitty.len(), 2);
    }

    #[test]
    fn wrong_phase_leaves_state_untouched() {
        let mut state = dealt(TrumpMode::Declared);
        let before = state.clone();
        let err = apply(
            &mut state,
            &act(
                1,
                ActionBody::PlayCard(PlayCard {
                    card: c(Rank::Ace, Suit::Spades),
                }),
            ),
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::WrongPhase { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn ephemeral_actions_are_refused() {
        let mut state = GameState::new();
        let err = apply(&mut state, &act(0, ActionBody::Honk(Honk { target: p(1) }))).unwrap_err();
        assert_eq!(err, RuleError::Ephemeral(ActionKind::Honk));
    }

    #[test]
    fn declarer_is_highest_bet_with_ties_to_earliest_seat() {
        let mut state = dealt(TrumpMode::Declared);
        apply(&mut state, &act(0, ActionBody::ChoseBet(ChoseBet { bet: 2 }))).unwrap();
        assert_eq!(state.phase, Phase::Betting);
        apply(&mut state, &act(1, ActionBody::ChoseBet(ChoseBet { bet: 2 }))).unwrap();
        // P2 sits left of the dealer so wins the tie.
        assert_eq!(state.declarer, Some(p(1)));
        assert_eq!(state.phase, Phase::ChoosingTrump);
    }

    #[test]
    fn double_bet_is_rejected() {
        let mut state = dealt(TrumpMode::Declared);
        apply(&mut state, &act(0, ActionBody::ChoseBet(ChoseBet { bet: 1 }))).unwrap();
        let err = apply(&mut state, &act(0, ActionBody::ChoseBet(ChoseBet { bet: 1 }))).unwrap_err();
        assert_eq!(err, RuleError::AlreadyBet(p(0)));
    }

    #[test]
    fn turn_up_mode_goes_straight_to_playing() {
        let mut state = dealt(TrumpMode::TurnUp);
        assert_eq!(state.trump, Some(Suit::Diamonds));
        apply(&mut state, &act(0, ActionBody::ChoseBet(ChoseBet { bet: 1 }))).unwrap();
        apply(&mut state, &act(1, ActionBody::ChoseBet(ChoseBet { bet: 2 }))).unwrap();
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.turn, Some(p(1)));
    }

    #[test]
    fn trump_cancel_returns_kitty() {
        let mut state = dealt(TrumpMode::Declared);
        apply(&mut state, &act(0, ActionBody::ChoseBet(ChoseBet { bet: 3 }))).unwrap();
        apply(&mut state, &act(1, ActionBody::ChoseBet(ChoseBet { bet: 0 }))).unwrap();
        assert_eq!(state.declarer, Some(p(0)));

        let err = apply(
            &mut state,
            &act(1, ActionBody::ChoseTrump(ChoseTrump { suit: Suit::Hearts })),
        )
        .unwrap_err();
        assert_eq!(err, RuleError::NotDeclarer { player: p(1) });

        apply(
            &mut state,
            &act(0, ActionBody::ChoseTrump(ChoseTrump { suit: Suit::Hearts })),
        )
        .unwrap();
        assert_eq!(state.hands[&p(0)].len(), 5);
        assert_eq!(state.phase, Phase::Discarding);

        apply(&mut state, &act(0, ActionBody::CancelTrump(CancelTrump))).unwrap();
        assert_eq!(state.hands[&p(0)].len(), 3);
        assert_eq!(state.trump, None);
        assert_eq!(state.phase, Phase::ChoosingTrump);
    }

    #[test]
    fn discard_must_match_kitty_size() {
        let mut state = dealt(TrumpMode::Declared);
        apply(&mut state, &act(0, ActionBody::ChoseBet(ChoseBet { bet: 3 }))).unwrap();
        apply(&mut state, &act(1, ActionBody::ChoseBet(ChoseBet { bet: 0 }))).unwrap();
        apply(
            &mut state,
            &act(0, ActionBody::ChoseTrump(ChoseTrump { suit: Suit::Spades })),
        )
        .unwrap();

        let err = apply(
            &mut state,
            &act(
                0,
                ActionBody::Discard(Discard {
                    cards: vec![c(Rank::Four, Suit::Diamonds)],
                }),
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RuleError::DiscardCount {
                expected: 2,
                got: 1
            }
        );

        apply(
            &mut state,
            &act(
                0,
                ActionBody::Discard(Discard {
                    cards: vec![c(Rank::Four, Suit::Diamonds), c(Rank::Five, Suit::Diamonds)],
                }),
            ),
        )
        .unwrap();
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.hands[&p(0)].len(), 3);
        assert_eq!(state.turn, Some(p(1)));
    }

    #[test]
    fn full_round_scores_and_ends_game() {
        let mut state = dealt(TrumpMode::TurnUp);
        // Trump is diamonds; nobody holds one.
        apply(&mut state, &act(1, ActionBody::ChoseBet(ChoseBet { bet: 3 }))).unwrap();
        apply(&mut state, &act(0, ActionBody::ChoseBet(ChoseBet { bet: 1 }))).unwrap();

        let plays = [
            (1, c(Rank::Ace, Suit::Spades)),
            (0, c(Rank::King, Suit::Spades)),
            (1, c(Rank::Two, Suit::Hearts)),
            (0, c(Rank::Three, Suit::Hearts)),
            (0, c(Rank::Nine, Suit::Clubs)),
            (1, c(Rank::Ten, Suit::Clubs)),
        ];
        for (seat, card) in plays {
            apply(&mut state, &act(seat, ActionBody::PlayCard(PlayCard { card }))).unwrap();
        }

        assert_eq!(state.tricks.len(), 3);
        assert_eq!(state.tricks[1].winner, Some(p(0)));
        assert_eq!(state.tricks_won[&p(1)], 2);
        assert_eq!(state.tricks_won[&p(0)], 1);
        // P2 bet 3, took 2; P1 bet 1, took 1.
        assert_eq!(state.scores[&p(1)], -1);
        assert_eq!(state.scores[&p(0)], 11);
        assert_eq!(state.phase, Phase::AwaitingNewGame);
    }

    #[test]
    fn trump_beats_led_suit() {
        let trick = Trick {
            plays: vec![
                (p(0), c(Rank::Ace, Suit::Hearts)),
                (p(1), c(Rank::Two, Suit::Spades)),
                (p(2), c(Rank::King, Suit::Hearts)),
            ],
            winner: None,
        };
        assert_eq!(trick_winner(&trick, Some(Suit::Spades)), Some(p(1)));
        assert_eq!(trick_winner(&trick, None), Some(p(0)));
    }

    #[test]
    fn card_must_be_held_and_played_once_per_trick() {
        let mut state = dealt(TrumpMode::TurnUp);
        apply(&mut state, &act(1, ActionBody::ChoseBet(ChoseBet { bet: 1 }))).unwrap();
        apply(&mut state, &act(0, ActionBody::ChoseBet(ChoseBet { bet: 1 }))).unwrap();

        let err = apply(
            &mut state,
            &act(
                1,
                ActionBody::PlayCard(PlayCard {
                    card: c(Rank::King, Suit::Spades),
                }),
            ),
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::CardNotHeld { .. }));

        apply(
            &mut state,
            &act(
                1,
                ActionBody::PlayCard(PlayCard {
                    card: c(Rank::Ace, Suit::Spades),
                }),
            ),
        )
        .unwrap();
        let err = apply(
            &mut state,
            &act(
                1,
                ActionBody::PlayCard(PlayCard {
                    card: c(Rank::Two, Suit::Hearts),
                }),
            ),
        )
        .unwrap_err();
        assert_eq!(err, RuleError::AlreadyPlayed(p(1)));
    }

    #[test]
    fn deck_with_duplicates_is_rejected() {
        let mut state = GameState::new();
        apply(
            &mut state,
            &act(
                0,
                ActionBody::StartNewGame(StartNewGame {
                    rounds: 2,
                    trump_mode: TrumpMode::Declared,
                }),
            ),
        )
        .unwrap();
        apply(
            &mut state,
            &act(
                0,
                ActionBody::PlayOrder(PlayOrder {
                    order: vec![p(0), p(1)],
                }),
            ),
        )
        .unwrap();
        apply(&mut state, &act(0, ActionBody::Dealer(Dealer { dealer: p(1) }))).unwrap();
        let ace = c(Rank::Ace, Suit::Spades);
        let err = apply(
            &mut state,
            &act(
                1,
                ActionBody::SendDeck(SendDeck {
                    deck: vec![ace, ace],
                    hand_size: 1,
                }),
            ),
        )
        .unwrap_err();
        assert_eq!(err, RuleError::DuplicateCard(ace));
        assert_eq!(state.phase, Phase::Dealing);
    }

    #[test]
    fn start_new_game_requires_rounds() {
        let mut state = GameState::new();
        let err = apply(
            &mut state,
            &act(
                0,
                ActionBody::StartNewGame(StartNewGame {
                    rounds: 0,
                    trump_mode: TrumpMode::Declared,
                }),
            ),
        )
        .unwrap_err();
        assert_eq!(err, RuleError::NoRounds);
    }

    #[test]
    fn send_state_replaces_everything() {
        let mut state = dealt(TrumpMode::Declared);
        let snapshot = GameState {
            phase: Phase::Scoring,
            round: 4,
            ..GameState::default()
        };
        apply(
            &mut state,
            &act(
                0,
                ActionBody::SendState(Box::new(trick_types::SendState {
                    state: snapshot.clone(),
                })),
            ),
        )
        .unwrap();
        assert_eq!(state, snapshot);
    }
}
