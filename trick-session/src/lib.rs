//! # trick-session
//!
//! Runs one game session for one peer.
//!
//! A session is a single worker task that owns the [`Router`] and therefore
//! the authoritative [`GameState`]. Everything that mutates state arrives as
//! a message to that worker: live actions from the [`PeerTransport`], local
//! decisions submitted through the [`SessionHandle`], and catch-up batches
//! fetched from the [`ActionLog`].
//!
//! ```text
//! submit → Sequencer → worker (apply) → persist_and_send → ActionLog
//!                                                       ↘ PeerTransport → remote workers
//! ```
//!
//! [`Router`]: trick_core::Router
//! [`GameState`]: trick_types::GameState
//! [`ActionLog`]: trick_log::ActionLog

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catchup;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod sequencer;
pub mod session;
pub mod transport;

pub use catchup::{CatchUpFlag, CatchUpGuard, CatchUpReport};
pub use config::{
    CatchUpConfig, ConfigError, LogConfig, SequencerConfig, SessionConfig, WorkerConfig,
};
pub use error::{AllocationError, CatchUpError, SessionError};
pub use events::{BufferReason, SessionEvent};
pub use pipeline::{persist_and_send, unix_now, Delivery, StepOutcome};
pub use sequencer::Sequencer;
pub use session::{Session, SessionHandle, SessionSnapshot, Submitted};
pub use transport::{MemoryMesh, MeshTransport, MockTransport, PeerTransport, TransportError};
