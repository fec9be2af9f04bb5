//! # trick-core
//!
//! Pure logic for Trickline (no I/O, instant tests).
//!
//! This crate holds the phase-gated action router and everything it needs:
//! the validity table, the game rules, the pending and gap buffers, and the
//! catch-up replay pass. Nothing here touches the network, the log, or a
//! clock.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. The [`Router`] reports what it did as a list of
//! [`RouterEvent`]s; the session worker in `trick-session` turns those into
//! log lines and subscriber notifications.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bot;
pub mod gap;
pub mod pending;
pub mod replay;
pub mod router;
pub mod rules;
pub mod validity;

#[cfg(any(test, feature = "test-util"))]
pub mod fixtures;

pub use bot::next_move;
pub use gap::{GapBuffer, Watermark};
pub use pending::{PendingBuffer, PendingError, DEFAULT_PENDING_CAPACITY};
pub use replay::{replay, Progress, ReplayReport};
pub use router::{Admission, DropReason, Router, RouterEvent};
pub use rules::{apply, RuleError};
pub use validity::{accepts, phases_for};
