//! Deterministic autoplay policy.
//!
//! Given a state, [`next_move`] picks the player expected to act and a
//! reasonable decision for them. Only the in-round phases are covered:
//! starting games, seating and dealing need a host with a deck.

use std::collections::BTreeMap;

use trick_types::{
    ActionBody, Card, ChoseBet, ChoseTrump, Discard, GameState, Phase, PlayCard, PlayerId, Rank,
    Suit,
};

/// The next in-round decision, if any player is expected to act.
pub fn next_move(state: &GameState) -> Option<(PlayerId, ActionBody)> {
    match state.phase {
        Phase::Betting => {
            let player = state
                .order_from_dealer()
                .into_iter()
                .find(|p| !state.bets.contains_key(p))?;
            let hand = state.hands.get(&player)?;
            let bet = hand.iter().filter(|c| c.rank >= Rank::Queen).count();
            let bet = u8::try_from(bet).unwrap_or(u8::MAX);
            Some((player, ActionBody::ChoseBet(ChoseBet { bet })))
        }
        Phase::ChoosingTrump => {
            let declarer = state.declarer?;
            let suit = longest_suit(state.hands.get(&declarer)?);
            Some((declarer, ActionBody::ChoseTrump(ChoseTrump { suit })))
        }
        Phase::Discarding => {
            let declarer = state.declarer?;
            let mut hand = state.hands.get(&declarer)?.clone();
            hand.sort_by_key(|c| (Some(c.suit) == state.trump, c.rank, c.suit));
            hand.truncate(state.kitty.len());
            Some((declarer, ActionBody::Discard(Discard { cards: hand })))
        }
        Phase::Playing => {
            let player = state.turn?;
            let card = choose_card(state.hands.get(&player)?, state)?;
            Some((player, ActionBody::PlayCard(PlayCard { card })))
        }
        Phase::AwaitingNewGame | Phase::Dealing | Phase::Scoring => None,
    }
}

/// Follow suit with the highest card, otherwise throw the lowest. Lead the
/// highest card in hand.
fn choose_card(hand: &[Card], state: &GameState) -> Option<Card> {
    match state.current_trick.led_suit() {
        None => hand.iter().max_by_key(|c| (c.rank, c.suit)).copied(),
        Some(led) => hand
            .iter()
            .filter(|c| c.suit == led)
            .max_by_key(|c| c.rank)
            .or_else(|| hand.iter().min_by_key(|c| (c.rank, c.suit)))
            .copied(),
    }
}

fn longest_suit(hand: &[Card]) -> Suit {
    let mut counts: BTreeMap<Suit, usize> = BTreeMap::new();
    for card in hand {
        *counts.entry(card.suit).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(suit, count)| (*count, *suit))
        .map(|(suit, _)| suit)
        .unwrap_or(Suit::Spades)
}
