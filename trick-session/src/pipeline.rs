//! Persist and broadcast pipeline for locally originated actions.
//!
//! The two side effects are independent: a failed append does not stop the
//! broadcast and a failed broadcast does not undo the append. Neither
//! failure is fatal; both are traced and reported in the [`Delivery`].

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use trick_log::ActionLog;
use trick_types::{Action, SessionId};

use crate::catchup::CatchUpFlag;
use crate::transport::PeerTransport;

/// Outcome of one side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step succeeded.
    Done,
    /// The step did not apply to this action.
    Skipped,
    /// The step failed; the error was traced.
    Failed(String),
}

impl StepOutcome {
    /// Whether the step succeeded.
    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done)
    }
}

/// What happened to a locally originated action after it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Append to the action log.
    pub persist: StepOutcome,
    /// Broadcast to the other peers.
    pub broadcast: StepOutcome,
}

impl Delivery {
    /// Both steps postponed until the running catch-up finishes.
    pub fn deferred() -> Self {
        Self {
            persist: StepOutcome::Skipped,
            broadcast: StepOutcome::Skipped,
        }
    }

    /// Whether neither step ran.
    pub fn is_deferred(&self) -> bool {
        self.persist == StepOutcome::Skipped && self.broadcast == StepOutcome::Skipped
    }
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Append the action to the log, then broadcast it.
///
/// Does nothing and returns [`Delivery::deferred`] while a catch-up holds
/// `catching_up`. Ephemeral kinds are broadcast only.
pub async fn persist_and_send(
    log: &dyn ActionLog,
    transport: &dyn PeerTransport,
    session: SessionId,
    action: &Action,
    catching_up: &CatchUpFlag,
) -> Delivery {
    if catching_up.is_held() {
        debug!(sequence = %action.sequence, kind = %action.kind(), "catch-up running, delivery deferred");
        return Delivery::deferred();
    }

    let wire = match action.to_wire() {
        Ok(wire) => wire,
        Err(e) => {
            warn!(sequence = %action.sequence, kind = %action.kind(), error = %e, "failed to encode action");
            let reason = e.to_string();
            return Delivery {
                persist: StepOutcome::Failed(reason.clone()),
                broadcast: StepOutcome::Failed(reason),
            };
        }
    };

    let persist = if action.is_ephemeral() {
        StepOutcome::Skipped
    } else {
        match log.append(session, &wire).await {
            Ok(()) => StepOutcome::Done,
            Err(e) => {
                warn!(%session, sequence = %action.sequence, error = %e, "failed to persist action");
                StepOutcome::Failed(e.to_string())
            }
        }
    };

    let broadcast = match wire.to_bytes() {
        Ok(bytes) => match transport.send(&bytes).await {
            Ok(()) => StepOutcome::Done,
            Err(e) => {
                warn!(%session, sequence = %action.sequence, error = %e, "failed to broadcast action");
                StepOutcome::Failed(e.to_string())
            }
        },
        Err(e) => {
            warn!(sequence = %action.sequence, error = %e, "failed to serialize action");
            StepOutcome::Failed(e.to_string())
        }
    };

    Delivery { persist, broadcast }
}
