//! Per-session sequence allocation.
//!
//! The counter itself lives in the action log, whose transaction makes each
//! allocation atomic across processes. The sequencer adds bounded retries
//! for lost races.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use trick_log::ActionLog;
use trick_types::{Sequence, SessionId};

use crate::config::SequencerConfig;
use crate::error::AllocationError;

/// Allocates sequences for sessions stored in one action log.
#[derive(Clone)]
pub struct Sequencer {
    log: Arc<dyn ActionLog>,
    max_retries: u32,
    backoff: Duration,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Sequencer {
    /// Create a sequencer over the given log.
    pub fn new(log: Arc<dyn ActionLog>, config: &SequencerConfig) -> Self {
        Self {
            log,
            max_retries: config.max_retries,
            backoff: config.backoff(),
        }
    }

    /// Allocate the next sequence for the session.
    ///
    /// Conflicts are retried up to `max_retries` times with a linearly
    /// growing backoff. Any other log failure is returned at once.
    ///
    /// # Errors
    ///
    /// [`AllocationError::Conflict`] when every attempt conflicted,
    /// [`AllocationError::Infrastructure`] otherwise.
    pub async fn allocate(&self, session: SessionId) -> Result<Sequence, AllocationError> {
        let mut attempt = 0u32;
        loop {
            match self.log.allocate_next_sequence(session).await {
                Ok(sequence) => return Ok(sequence),
                Err(err) if err.is_conflict() => {
                    if attempt >= self.max_retries {
                        warn!(%session, attempts = attempt + 1, "sequence allocation gave up");
                        return Err(AllocationError::Conflict {
                            session,
                            attempts: attempt + 1,
                        });
                    }
                    attempt += 1;
                    debug!(%session, attempt, "sequence allocation conflicted, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(err) => return Err(AllocationError::Infrastructure(err)),
            }
        }
    }

    /// Reset the session counter so the next allocation returns 1.
    ///
    /// # Errors
    ///
    /// Returns the log failure as [`AllocationError::Infrastructure`].
    pub async fn reset(&self, session: SessionId) -> Result<(), AllocationError> {
        self.log
            .reset_sequence(session)
            .await
            .map_err(AllocationError::Infrastructure)
    }
}
