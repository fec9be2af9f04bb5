//! # trick-types
//!
//! Wire format types for the Trickline game synchronization core.
//!
//! This crate provides the foundational types used across all Trickline crates:
//! - [`PlayerId`], [`SessionId`], [`Sequence`] - Identity and ordering types
//! - [`Card`], [`Suit`], [`Rank`] - Playing cards
//! - [`Action`], [`ActionBody`], [`ActionKind`] - Sequenced player decisions
//! - [`WireAction`] - The serialized record exchanged between peers and the log
//! - [`GameState`], [`Phase`] - The authoritative per-session state
//! - [`WireError`] - Decode/encode errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod action;
mod cards;
mod error;
mod ids;
mod state;

pub use action::{
    Action, ActionBody, ActionKind, CancelTrump, ChoseBet, ChoseTrump, Dealer, Discard, Honk,
    PlayCard, PlayOrder, SendDeck, SendState, SlowPoke, StartNewGame, WireAction,
};
pub use cards::{Card, Rank, Suit};
pub use error::WireError;
pub use ids::{PlayerId, Sequence, SessionId, MAX_PLAYERS};
pub use state::{GameState, Phase, Trick, TrumpMode};
