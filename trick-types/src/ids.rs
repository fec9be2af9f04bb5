//! Identity and ordering types for Trickline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::WireError;

/// Maximum number of seats at a table.
pub const MAX_PLAYERS: u8 = 6;

/// A seat at the table.
///
/// Seats are enumerated `0..MAX_PLAYERS`. Out-of-range values are rejected
/// during deserialization, so a decoded `PlayerId` is always valid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PlayerId(u8);

impl PlayerId {
    /// Create a PlayerId, checking the seat range.
    pub fn new(seat: u8) -> Result<Self, WireError> {
        if seat < MAX_PLAYERS {
            Ok(Self(seat))
        } else {
            Err(WireError::InvalidPlayer(seat))
        }
    }

    /// Seat index of this player.
    pub fn seat(&self) -> u8 {
        self.0
    }

    /// All valid seats, in order.
    pub fn all() -> impl Iterator<Item = PlayerId> {
        (0..MAX_PLAYERS).map(PlayerId)
    }
}

impl TryFrom<u8> for PlayerId {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlayerId> for u8 {
    fn from(id: PlayerId) -> u8 {
        id.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0 + 1)
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.0)
    }
}

/// A unique identifier for a game session.
///
/// UUID v4 format (16 bytes).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Create a new random SessionId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create a SessionId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        uuid::Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Get the raw bytes of this SessionId.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

/// Position of an action in the session's total order.
///
/// Allocated by the sequencer, never by the peer that applies the action.
/// Zero is reserved for ephemeral signals that are never sequenced.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(u64);

impl Sequence {
    /// The value carried by ephemeral (unsequenced) actions.
    pub const UNSEQUENCED: Sequence = Sequence(0);

    /// Create a new Sequence with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Sequence.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The watermark of a session where nothing has been applied.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Whether this is a real allocated sequence.
    pub fn is_sequenced(&self) -> bool {
        self.0 != 0
    }

    /// Increment the sequence by one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sequence({})", self.0)
    }
}
