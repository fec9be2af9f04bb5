//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use trick_log::{ActionLog, LogError, RangeBatch};
use trickline_session::{PeerTransport, Session, SessionConfig, SessionHandle};
use trick_types::{Sequence, SessionId, WireAction};

/// No start-up catch-up, no automatic gap recovery.
pub fn quiet_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.catch_up.on_start = false;
    config.catch_up.auto_on_gap = false;
    config
}

pub fn spawn_session(
    id: SessionId,
    log: Arc<dyn ActionLog>,
    transport: Arc<dyn PeerTransport>,
    config: SessionConfig,
) -> SessionHandle {
    Session::new(id, log, transport).with_config(config).spawn()
}

/// Poll `check` until it returns true, failing the test after two seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {what}");
}

pub async fn watermark_reaches(handle: &SessionHandle, target: u64) {
    eventually(&format!("watermark {target}"), || async move {
        handle.watermark().await.unwrap().value() >= target
    })
    .await;
}

/// An action log whose `range` and `delete_all` block until the test opens
/// the gate, one permit per call.
///
/// Lets a test keep a catch-up or reset guard held for as long as it needs.
pub struct GatedLog<L> {
    inner: L,
    gate: Arc<Semaphore>,
}

impl<L> GatedLog<L> {
    pub fn new(inner: L) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                inner,
                gate: Arc::clone(&gate),
            },
            gate,
        )
    }

    async fn pass(&self) -> Result<(), LogError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| LogError::Unavailable(e.to_string()))?;
        permit.forget();
        Ok(())
    }
}

#[async_trait]
impl<L: ActionLog> ActionLog for GatedLog<L> {
    async fn append(&self, session: SessionId, action: &WireAction) -> Result<(), LogError> {
        self.inner.append(session, action).await
    }

    async fn range(
        &self,
        session: SessionId,
        from: Sequence,
        to: Option<Sequence>,
    ) -> Result<RangeBatch, LogError> {
        self.pass().await?;
        self.inner.range(session, from, to).await
    }

    async fn allocate_next_sequence(&self, session: SessionId) -> Result<Sequence, LogError> {
        self.inner.allocate_next_sequence(session).await
    }

    async fn reset_sequence(&self, session: SessionId) -> Result<(), LogError> {
        self.inner.reset_sequence(session).await
    }

    async fn delete_all(&self, session: SessionId, batch_size: u32) -> Result<u64, LogError> {
        self.pass().await?;
        self.inner.delete_all(session, batch_size).await
    }
}
