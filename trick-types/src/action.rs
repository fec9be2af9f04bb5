//! Sequenced player actions and their wire record.
//!
//! Peers and the action log exchange [`WireAction`] records whose payload is
//! opaque bytes keyed by [`ActionKind`]. [`Action::from_wire`] is the single
//! decode boundary: it turns a record into a strongly typed [`ActionBody`] or
//! fails with a [`WireError`]. Nothing downstream ever sees raw payloads.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Card, GameState, PlayerId, Sequence, Suit, TrumpMode, WireError};

/// Closed set of action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// Seat order for the game.
    PlayOrder,
    /// A card played into the current trick.
    PlayCard,
    /// The shuffled deck for a round.
    SendDeck,
    /// A bet.
    ChoseBet,
    /// Trump named by the declarer.
    ChoseTrump,
    /// Declarer withdraws the trump choice.
    CancelTrump,
    /// Declarer discards after taking the kitty.
    Discard,
    /// Full state snapshot.
    SendState,
    /// Start a new game.
    StartNewGame,
    /// Presence signal: "I'm still thinking".
    AmSlowPoke,
    /// Nudge another player.
    Honk,
    /// Dealer selection.
    Dealer,
}

impl ActionKind {
    /// Every kind, in wire declaration order.
    pub const ALL: [ActionKind; 12] = [
        ActionKind::PlayOrder,
        ActionKind::PlayCard,
        ActionKind::SendDeck,
        ActionKind::ChoseBet,
        ActionKind::ChoseTrump,
        ActionKind::CancelTrump,
        ActionKind::Discard,
        ActionKind::SendState,
        ActionKind::StartNewGame,
        ActionKind::AmSlowPoke,
        ActionKind::Honk,
        ActionKind::Dealer,
    ];

    /// Ephemeral kinds are broadcast but never sequenced or persisted.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, ActionKind::AmSlowPoke | ActionKind::Honk)
    }

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::PlayOrder => "playOrder",
            ActionKind::PlayCard => "playCard",
            ActionKind::SendDeck => "sendDeck",
            ActionKind::ChoseBet => "choseBet",
            ActionKind::ChoseTrump => "choseTrump",
            ActionKind::CancelTrump => "cancelTrump",
            ActionKind::Discard => "discard",
            ActionKind::SendState => "sendState",
            ActionKind::StartNewGame => "startNewGame",
            ActionKind::AmSlowPoke => "amSlowPoke",
            ActionKind::Honk => "honk",
            ActionKind::Dealer => "dealer",
        }
    }
}

impl FromStr for ActionKind {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WireError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `startNewGame` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartNewGame {
    /// Number of rounds in the game.
    pub rounds: u8,
    /// Trump rule for every round of the game.
    pub trump_mode: TrumpMode,
}

/// `playOrder` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayOrder {
    /// Seats in play order.
    pub order: Vec<PlayerId>,
}

/// `dealer` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dealer {
    /// Dealer for the coming round.
    pub dealer: PlayerId,
}

/// `sendDeck` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendDeck {
    /// The shuffled deck, top card first.
    pub deck: Vec<Card>,
    /// Cards dealt to each player.
    pub hand_size: u8,
}

/// `choseBet` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoseBet {
    /// Tricks the player expects to take.
    pub bet: u8,
}

/// `choseTrump` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoseTrump {
    /// Named trump suit.
    pub suit: Suit,
}

/// `cancelTrump` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTrump;

/// `discard` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discard {
    /// Cards put aside by the declarer.
    pub cards: Vec<Card>,
}

/// `playCard` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCard {
    /// The card played.
    pub card: Card,
}

/// `sendState` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendState {
    /// Replacement state.
    pub state: GameState,
}

/// `amSlowPoke` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowPoke;

/// `honk` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Honk {
    /// Player being nudged.
    pub target: PlayerId,
}

/// Typed payload of an action, one variant per [`ActionKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionBody {
    #[allow(missing_docs)]
    PlayOrder(PlayOrder),
    #[allow(missing_docs)]
    PlayCard(PlayCard),
    #[allow(missing_docs)]
    SendDeck(SendDeck),
    #[allow(missing_docs)]
    ChoseBet(ChoseBet),
    #[allow(missing_docs)]
    ChoseTrump(ChoseTrump),
    #[allow(missing_docs)]
    CancelTrump(CancelTrump),
    #[allow(missing_docs)]
    Discard(Discard),
    #[allow(missing_docs)]
    SendState(Box<SendState>),
    #[allow(missing_docs)]
    StartNewGame(StartNewGame),
    #[allow(missing_docs)]
    AmSlowPoke(SlowPoke),
    #[allow(missing_docs)]
    Honk(Honk),
    #[allow(missing_docs)]
    Dealer(Dealer),
}

impl ActionBody {
    /// Kind tag of this body.
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionBody::PlayOrder(_) => ActionKind::PlayOrder,
            ActionBody::PlayCard(_) => ActionKind::PlayCard,
            ActionBody::SendDeck(_) => ActionKind::SendDeck,
            ActionBody::ChoseBet(_) => ActionKind::ChoseBet,
            ActionBody::ChoseTrump(_) => ActionKind::ChoseTrump,
            ActionBody::CancelTrump(_) => ActionKind::CancelTrump,
            ActionBody::Discard(_) => ActionKind::Discard,
            ActionBody::SendState(_) => ActionKind::SendState,
            ActionBody::StartNewGame(_) => ActionKind::StartNewGame,
            ActionBody::AmSlowPoke(_) => ActionKind::AmSlowPoke,
            ActionBody::Honk(_) => ActionKind::Honk,
            ActionBody::Dealer(_) => ActionKind::Dealer,
        }
    }

    /// Encode the payload bytes for this body.
    pub fn encode_payload(&self) -> Result<Vec<u8>, WireError> {
        let bytes = match self {
            ActionBody::PlayOrder(p) => rmp_serde::to_vec(p),
            ActionBody::PlayCard(p) => rmp_serde::to_vec(p),
            ActionBody::SendDeck(p) => rmp_serde::to_vec(p),
            ActionBody::ChoseBet(p) => rmp_serde::to_vec(p),
            ActionBody::ChoseTrump(p) => rmp_serde::to_vec(p),
            ActionBody::CancelTrump(p) => rmp_serde::to_vec(p),
            ActionBody::Discard(p) => rmp_serde::to_vec(p),
            ActionBody::SendState(p) => rmp_serde::to_vec(p.as_ref()),
            ActionBody::StartNewGame(p) => rmp_serde::to_vec(p),
            ActionBody::AmSlowPoke(p) => rmp_serde::to_vec(p),
            ActionBody::Honk(p) => rmp_serde::to_vec(p),
            ActionBody::Dealer(p) => rmp_serde::to_vec(p),
        };
        bytes.map_err(WireError::Serialization)
    }

    /// Decode payload bytes according to the declared kind.
    pub fn decode(kind: ActionKind, payload: &[u8]) -> Result<Self, WireError> {
        fn typed<T: DeserializeOwned>(kind: ActionKind, payload: &[u8]) -> Result<T, WireError> {
            rmp_serde::from_slice(payload)
                .map_err(|source| WireError::MalformedPayload { kind, source })
        }

        Ok(match kind {
            ActionKind::PlayOrder => ActionBody::PlayOrder(typed(kind, payload)?),
            ActionKind::PlayCard => ActionBody::PlayCard(typed(kind, payload)?),
            ActionKind::SendDeck => ActionBody::SendDeck(typed(kind, payload)?),
            ActionKind::ChoseBet => ActionBody::ChoseBet(typed(kind, payload)?),
            ActionKind::ChoseTrump => ActionBody::ChoseTrump(typed(kind, payload)?),
            ActionKind::CancelTrump => ActionBody::CancelTrump(typed(kind, payload)?),
            ActionKind::Discard => ActionBody::Discard(typed(kind, payload)?),
            ActionKind::SendState => ActionBody::SendState(Box::new(typed(kind, payload)?)),
            ActionKind::StartNewGame => ActionBody::StartNewGame(typed(kind, payload)?),
            ActionKind::AmSlowPoke => ActionBody::AmSlowPoke(typed(kind, payload)?),
            ActionKind::Honk => ActionBody::Honk(typed(kind, payload)?),
            ActionKind::Dealer => ActionBody::Dealer(typed(kind, payload)?),
        })
    }
}

/// Serialized action record, as stored in the log and sent to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAction {
    /// Acting player.
    pub player_id: PlayerId,
    /// Kind tag; selects the payload schema.
    pub kind: ActionKind,
    /// MessagePack-encoded payload.
    pub payload: Vec<u8>,
    /// Seconds since the Unix epoch at the point of decision.
    pub timestamp: u64,
    /// Allocated sequence, zero for ephemeral kinds.
    pub sequence: Sequence,
}

impl WireAction {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }
}

/// An immutable, decoded player decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Acting player.
    pub player: PlayerId,
    /// Typed payload.
    pub body: ActionBody,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Allocated sequence, [`Sequence::UNSEQUENCED`] for ephemeral kinds.
    pub sequence: Sequence,
}

impl Action {
    /// Create an action.
    pub fn new(player: PlayerId, body: ActionBody, timestamp: u64, sequence: Sequence) -> Self {
        Self {
            player,
            body,
            timestamp,
            sequence,
        }
    }

    /// Kind of this action.
    pub fn kind(&self) -> ActionKind {
        self.body.kind()
    }

    /// Whether the action is an ephemeral signal.
    pub fn is_ephemeral(&self) -> bool {
        self.kind().is_ephemeral()
    }

    /// Total ordering key: sequence first, then timestamp, player and kind.
    ///
    /// Sequences are unique within a session, so the trailing fields only
    /// matter for records a faulty store returned twice.
    pub fn ordering_key(&self) -> (Sequence, u64, PlayerId, ActionKind) {
        (self.sequence, self.timestamp, self.player, self.kind())
    }

    /// Encode into the wire record.
    pub fn to_wire(&self) -> Result<WireAction, WireError> {
        Ok(WireAction {
            player_id: self.player,
            kind: self.kind(),
            payload: self.body.encode_payload()?,
            timestamp: self.timestamp,
            sequence: self.sequence,
        })
    }

    /// Decode a wire record.
    ///
    /// Authoritative kinds must carry an allocated sequence; ephemeral kinds
    /// must not.
    pub fn from_wire(wire: &WireAction) -> Result<Self, WireError> {
        if wire.kind.is_ephemeral() == wire.sequence.is_sequenced() {
            return Err(WireError::InvalidSequence {
                kind: wire.kind,
                sequence: wire.sequence.value(),
            });
        }
        let body = ActionBody::decode(wire.kind, &wire.payload)?;
        Ok(Self {
            player: wire.player_id,
            body,
            timestamp: wire.timestamp,
            sequence: wire.sequence,
        })
    }

    /// Serialize to MessagePack bytes for the transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        self.to_wire()?.to_bytes()
    }

    /// Deserialize and decode bytes received from the transport.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        Self::from_wire(&WireAction::from_bytes(bytes)?)
    }
}
