//! Scripted games for tests.
//!
//! Available to other crates behind the `test-util` feature.

use trick_types::{
    Action, ActionBody, Card, ChoseBet, Dealer, GameState, PlayCard, PlayOrder, PlayerId, Rank,
    SendDeck, Sequence, StartNewGame, Suit, TrumpMode,
};

use crate::bot::next_move;
use crate::router::Router;

/// Timestamp of sequence 1 in scripted games.
pub const SCRIPT_EPOCH: u64 = 1_700_000_000;

/// The first `n` seats.
pub fn seats(n: usize) -> Vec<PlayerId> {
    PlayerId::all().take(n).collect()
}

/// A full deck in a fixed, well-mixed order.
pub fn fixed_deck() -> Vec<Card> {
    let mut deck = Card::full_deck();
    deck.sort_by_key(|c| ((c.rank as usize) * 17 + (c.suit as usize) * 5) % 52);
    deck
}

/// Builds a sequenced action list, routing each action as it is added so
/// the autoplay policy always sees the current state.
#[derive(Debug, Default)]
pub struct Script {
    router: Router,
    actions: Vec<Action>,
}

impl Script {
    /// An empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action with the next sequence.
    pub fn push(&mut self, player: PlayerId, body: ActionBody) -> &Action {
        let sequence = Sequence::new(self.actions.len() as u64 + 1);
        let action = Action::new(player, body, SCRIPT_EPOCH + sequence.value(), sequence);
        self.router.route(action.clone());
        self.actions.push(action);
        &self.actions[self.actions.len() - 1]
    }

    /// Append autoplay moves until nobody is expected to act.
    pub fn autoplay(&mut self) {
        while let Some((player, body)) = next_move(self.router.state()) {
            self.push(player, body);
        }
    }

    /// State after every scripted action.
    pub fn state(&self) -> &GameState {
        self.router.state()
    }

    /// The scripted actions, in sequence order.
    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}

/// Start a game, seat `players`, deal from [`fixed_deck`] with the first
/// seat as dealer.
pub fn deal(script: &mut Script, players: usize, rounds: u8, mode: TrumpMode) {
    let order = seats(players);
    let host = order[0];
    script.push(
        host,
        ActionBody::StartNewGame(StartNewGame {
            rounds,
            trump_mode: mode,
        }),
    );
    script.push(host, ActionBody::PlayOrder(PlayOrder { order }));
    script.push(host, ActionBody::Dealer(Dealer { dealer: host }));
    script.push(
        host,
        ActionBody::SendDeck(SendDeck {
            deck: fixed_deck(),
            hand_size: 4,
        }),
    );
}

/// A complete one-round game for `players` seats.
pub fn scripted_round(players: usize, mode: TrumpMode) -> Vec<Action> {
    let mut script = Script::new();
    deal(&mut script, players, 1, mode);
    script.autoplay();
    script.into_actions()
}

/// Three seats in turn-up mode where sequence 7 is a `playCard` allocated
/// before the final bet at sequence 8.
///
/// Dealer is the first seat, so the second seat bets first and leads.
pub fn turn_up_betting_script() -> Vec<Action> {
    let order = seats(3);
    let (dealer, lead, middle) = (order[0], order[1], order[2]);
    let mut script = Script::new();
    script.push(
        dealer,
        ActionBody::StartNewGame(StartNewGame {
            rounds: 1,
            trump_mode: TrumpMode::TurnUp,
        }),
    );
    script.push(dealer, ActionBody::PlayOrder(PlayOrder { order }));
    script.push(dealer, ActionBody::Dealer(Dealer { dealer }));
    script.push(
        dealer,
        ActionBody::SendDeck(SendDeck {
            deck: Card::full_deck(),
            hand_size: 3,
        }),
    );
    script.push(lead, ActionBody::ChoseBet(ChoseBet { bet: 1 }));
    script.push(middle, ActionBody::ChoseBet(ChoseBet { bet: 1 }));
    // The unshuffled deck deals the two of clubs to the lead.
    script.push(
        lead,
        ActionBody::PlayCard(PlayCard {
            card: Card::new(Rank::Two, Suit::Clubs),
        }),
    );
    script.push(dealer, ActionBody::ChoseBet(ChoseBet { bet: 0 }));
    script.into_actions()
}
