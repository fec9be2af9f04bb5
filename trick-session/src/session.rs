//! The session worker and its handle.
//!
//! [`Session::spawn`] starts three kinds of tasks:
//! - the worker, which owns the [`Router`] and handles one [`Command`] at a
//!   time
//! - the receive pump, which decodes records from the transport and hands
//!   them to the worker
//! - short-lived helpers: the gap timer, the optional start-up catch-up and
//!   the flush of actions deferred by a catch-up
//!
//! While a catch-up holds the session's [`CatchUpFlag`], live actions are
//! queued in the worker instead of routed, and local actions are applied but
//! neither persisted nor broadcast. Releasing the guard routes the queued
//! live actions and flushes the local ones.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use trick_core::{replay, ReplayReport, Router, RouterEvent};
use trick_log::ActionLog;
use trick_types::{Action, ActionBody, GameState, PlayerId, Sequence, SessionId};

use crate::catchup::{CatchUpFlag, CatchUpGuard, CatchUpReport};
use crate::config::{CatchUpConfig, SessionConfig};
use crate::error::{CatchUpError, SessionError};
use crate::events::SessionEvent;
use crate::pipeline::{persist_and_send, unix_now, Delivery};
use crate::sequencer::Sequencer;
use crate::transport::{PeerTransport, TransportError};

/// Messages handled by the session worker.
enum Command {
    /// A live action from the transport.
    Deliver(Action),
    /// A locally originated action, already sequenced.
    ApplyLocal {
        action: Action,
        reply: oneshot::Sender<LocalDecision>,
    },
    /// A local action whose delivery found the guard held.
    DeferLocal(Action),
    /// A decoded catch-up batch.
    Replay {
        entries: Vec<Action>,
        reply: oneshot::Sender<ReplayReport>,
    },
    /// The catch-up guard was dropped.
    GuardReleased,
    /// Report state and buffer sizes.
    Snapshot(oneshot::Sender<SessionSnapshot>),
    /// Drop all local state; the log was already cleared.
    Reset(oneshot::Sender<()>),
    /// Stop the worker.
    Shutdown,
}

/// Whether the submitter should persist and broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalDecision {
    Proceed,
    Deferred,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Game state.
    pub state: GameState,
    /// Highest admitted sequence.
    pub watermark: Sequence,
    /// Actions parked until a later phase.
    pub pending: usize,
    /// Actions held ahead of the watermark.
    pub gap: usize,
    /// Sequences missing below the highest held one.
    pub missing: Vec<Sequence>,
    /// Whether a catch-up is running.
    pub catching_up: bool,
}

/// A submitted local action and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    /// The action as applied, with its allocated sequence.
    pub action: Action,
    /// Persist and broadcast outcomes.
    pub delivery: Delivery,
}

/// A session ready to be spawned.
pub struct Session {
    id: SessionId,
    log: Arc<dyn ActionLog>,
    transport: Arc<dyn PeerTransport>,
    config: SessionConfig,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session with the default configuration.
    pub fn new(id: SessionId, log: Arc<dyn ActionLog>, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            id,
            log,
            transport,
            config: SessionConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the worker and receive pump.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        let Session {
            id,
            log,
            transport,
            config,
        } = self;

        let (commands, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.session.event_capacity.max(1));
        let progress = Arc::new(watch::channel(1.0).0);
        let flag = CatchUpFlag::new();

        let inner = Arc::new(Inner {
            id,
            log: Arc::clone(&log),
            transport: Arc::clone(&transport),
            sequencer: Sequencer::new(Arc::clone(&log), &config.sequencer),
            flag: flag.clone(),
            commands: commands.clone(),
            events: events.clone(),
            progress: Arc::clone(&progress),
            delete_batch_size: config.log.delete_batch_size,
        });

        let worker = Worker {
            id,
            router: Router::with_pending_capacity(config.session.pending_capacity),
            log,
            transport: Arc::clone(&transport),
            flag,
            commands: commands.downgrade(),
            events: events.clone(),
            progress,
            deferred_live: Vec::new(),
            deferred_local: Vec::new(),
            catch_up: config.catch_up.clone(),
            gap_timer: Arc::new(AtomicBool::new(false)),
            handle: Arc::downgrade(&inner),
        };
        tokio::spawn(worker.run(receiver));
        tokio::spawn(receive_pump(id, transport, commands.downgrade(), events));

        let handle = SessionHandle { inner };
        info!(session = %id, "session started");

        if config.catch_up.on_start {
            let starter = handle.clone();
            tokio::spawn(async move {
                if let Err(e) = starter.catch_up(Sequence::new(1), None).await {
                    warn!(session = %starter.id(), error = %e, "start-up catch-up failed");
                }
            });
        }
        handle
    }
}

struct Inner {
    id: SessionId,
    log: Arc<dyn ActionLog>,
    transport: Arc<dyn PeerTransport>,
    sequencer: Sequencer,
    flag: CatchUpFlag,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
    progress: Arc<watch::Sender<f64>>,
    delete_batch_size: u32,
}

/// Cloneable handle to a running session.
///
/// The worker stops when [`close`](SessionHandle::close) is called or the
/// last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("catching_up", &self.inner.flag.is_held())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Session id.
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Subscribe to session events.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Catch-up progress in `[0.0, 1.0]`.
    ///
    /// Reads 1.0 after a successful catch-up and 0.0 after a failed one.
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.inner.progress.subscribe()
    }

    /// Whether a catch-up is running.
    pub fn is_catching_up(&self) -> bool {
        self.inner.flag.is_held()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.inner
            .commands
            .send(make(reply))
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// Sequence, apply, persist and broadcast a local decision.
    ///
    /// Ephemeral kinds skip the sequencer and the log. The action is applied
    /// locally before it is broadcast.
    ///
    /// # Errors
    ///
    /// Allocation failures are returned before anything is applied or sent.
    /// Persistence and transport failures are not errors; they are reported
    /// in [`Submitted::delivery`].
    pub async fn submit(&self, player: PlayerId, body: ActionBody) -> Result<Submitted, SessionError> {
        let inner = &self.inner;
        let sequence = if body.kind().is_ephemeral() {
            Sequence::UNSEQUENCED
        } else {
            inner.sequencer.allocate(inner.id).await?
        };
        let action = Action::new(player, body, unix_now(), sequence);
        // Refuse what cannot be encoded before it touches local state.
        action.to_wire()?;

        let decision = self
            .request(|reply| Command::ApplyLocal {
                action: action.clone(),
                reply,
            })
            .await?;

        let delivery = match decision {
            LocalDecision::Deferred => Delivery::deferred(),
            LocalDecision::Proceed => {
                let delivery = persist_and_send(
                    inner.log.as_ref(),
                    inner.transport.as_ref(),
                    inner.id,
                    &action,
                    &inner.flag,
                )
                .await;
                if delivery.is_deferred() {
                    inner
                        .commands
                        .send(Command::DeferLocal(action.clone()))
                        .map_err(|_| SessionError::Closed)?;
                }
                delivery
            }
        };
        Ok(Submitted { action, delivery })
    }

    /// Fetch `[from, to]` from the log and replay it.
    ///
    /// # Errors
    ///
    /// [`CatchUpError::Busy`] if a catch-up is already running,
    /// [`CatchUpError::Fetch`] if the range fetch fails. Neither changes the
    /// watermark; both leave progress at 0.0.
    pub async fn catch_up(
        &self,
        from: Sequence,
        to: Option<Sequence>,
    ) -> Result<CatchUpReport, CatchUpError> {
        let inner = &self.inner;
        let guard = self.acquire_guard().ok_or(CatchUpError::Busy)?;

        inner.progress.send_replace(0.0);
        info!(session = %inner.id, %from, to = ?to, "catch-up started");
        let _ = inner.events.send(SessionEvent::CatchUpStarted { from, to });

        let batch = match inner.log.range(inner.id, from, to).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(session = %inner.id, error = %e, "catch-up fetch failed");
                inner.progress.send_replace(0.0);
                let _ = inner.events.send(SessionEvent::CatchUpFailed {
                    reason: e.to_string(),
                });
                return Err(CatchUpError::Fetch(e));
            }
        };

        let fetched = batch.len();
        let mut entries = Vec::with_capacity(batch.records.len());
        let mut decode_failures = batch.corrupt.len();
        for row in batch.corrupt {
            warn!(session = %inner.id, sequence = ?row.sequence, reason = %row.reason, "skipping unreadable log row");
            let _ = inner.events.send(SessionEvent::Dropped {
                sequence: row.sequence,
                kind: None,
                reason: row.reason,
            });
        }
        for record in &batch.records {
            match Action::from_wire(record) {
                Ok(action) => entries.push(action),
                Err(e) => {
                    decode_failures += 1;
                    warn!(session = %inner.id, sequence = %record.sequence, error = %e, "skipping undecodable log record");
                    let _ = inner.events.send(SessionEvent::Dropped {
                        sequence: Some(record.sequence),
                        kind: Some(record.kind),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let replay = match self
            .request(|reply| Command::Replay { entries, reply })
            .await
        {
            Ok(replay) => replay,
            Err(_) => {
                inner.progress.send_replace(0.0);
                return Err(CatchUpError::Closed);
            }
        };

        let report = CatchUpReport {
            from,
            to,
            fetched,
            decode_failures,
            replay,
        };
        info!(
            session = %inner.id,
            fetched,
            admitted = report.replay.admitted,
            drained = report.replay.drained,
            watermark = %report.watermark(),
            "catch-up finished"
        );
        let _ = inner.events.send(SessionEvent::CatchUpFinished {
            report: report.clone(),
        });
        drop(guard);
        Ok(report)
    }

    /// Catch up from the watermark to the end of the log.
    pub async fn resync(&self) -> Result<CatchUpReport, CatchUpError> {
        let watermark = self
            .watermark()
            .await
            .map_err(|_| CatchUpError::Closed)?;
        self.catch_up(watermark.next(), None).await
    }

    /// Current game state and buffer sizes.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Snapshot).await
    }

    /// Highest admitted sequence.
    pub async fn watermark(&self) -> Result<Sequence, SessionError> {
        Ok(self.snapshot().await?.watermark)
    }

    /// Delete every logged action, reset the counter and the local state.
    ///
    /// Meant to run before the first action of a new game. Returns the
    /// number of deleted actions.
    ///
    /// # Errors
    ///
    /// Fails with [`CatchUpError::Busy`] while a catch-up is running.
    pub async fn reset_session(&self) -> Result<u64, SessionError> {
        let inner = &self.inner;
        let guard = self.acquire_guard().ok_or(CatchUpError::Busy)?;

        let deleted = inner
            .log
            .delete_all(inner.id, inner.delete_batch_size)
            .await?;
        inner.sequencer.reset(inner.id).await?;
        self.request(Command::Reset).await?;
        info!(session = %inner.id, deleted, "session reset");

        drop(guard);
        Ok(deleted)
    }

    /// Stop the worker and close the transport.
    pub async fn close(&self) -> Result<(), TransportError> {
        let _ = self.inner.commands.send(Command::Shutdown);
        self.inner.transport.close().await
    }

    fn acquire_guard(&self) -> Option<CatchUpGuard> {
        let commands = self.inner.commands.clone();
        self.inner.flag.try_acquire_with(move || {
            let _ = commands.send(Command::GuardReleased);
        })
    }
}

/// Owner of the session's game state.
struct Worker {
    id: SessionId,
    router: Router,
    log: Arc<dyn ActionLog>,
    transport: Arc<dyn PeerTransport>,
    flag: CatchUpFlag,
    commands: mpsc::WeakUnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
    progress: Arc<watch::Sender<f64>>,
    deferred_live: Vec<Action>,
    deferred_local: Vec<Action>,
    catch_up: CatchUpConfig,
    gap_timer: Arc<AtomicBool>,
    handle: Weak<Inner>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!(session = %self.id, "session worker running");
        while let Some(command) = commands.recv().await {
            match command {
                Command::Deliver(action) => self.deliver(action),
                Command::ApplyLocal { action, reply } => {
                    let decision = self.apply_local(action);
                    let _ = reply.send(decision);
                }
                Command::DeferLocal(action) => self.defer_local(vec![action]),
                Command::Replay { entries, reply } => {
                    let report = self.replay_batch(entries);
                    let _ = reply.send(report);
                }
                Command::GuardReleased => self.release(),
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                Command::Reset(reply) => {
                    self.router.reset();
                    self.deferred_live.clear();
                    // Local actions of the old game must not reach the new log.
                    self.deferred_local.clear();
                    let _ = reply.send(());
                }
                Command::Shutdown => break,
            }
        }
        info!(session = %self.id, "session stopped");
    }

    fn deliver(&mut self, action: Action) {
        if self.flag.is_held() {
            debug!(session = %self.id, sequence = %action.sequence, "catch-up running, live action queued");
            self.deferred_live.push(action);
            return;
        }
        let events = self.router.route(action);
        if self.publish(events) {
            self.on_gap();
        }
    }

    fn apply_local(&mut self, action: Action) -> LocalDecision {
        let events = self.router.route(action.clone());
        // A lower sequence allocated elsewhere may not have arrived yet.
        if self.publish(events) {
            self.on_gap();
        }
        if self.flag.is_held() {
            debug!(session = %self.id, sequence = %action.sequence, "catch-up running, local delivery deferred");
            self.defer_local(vec![action]);
            LocalDecision::Deferred
        } else {
            LocalDecision::Proceed
        }
    }

    fn replay_batch(&mut self, entries: Vec<Action>) -> ReplayReport {
        let progress = Arc::clone(&self.progress);
        let (report, events) = replay(&mut self.router, entries, |p| {
            progress.send_replace(p.fraction());
        });
        self.publish(events);
        self.progress.send_replace(1.0);
        report
    }

    fn release(&mut self) {
        if self.flag.is_held() {
            // Released and immediately re-acquired by another catch-up.
            return;
        }
        let queued = std::mem::take(&mut self.deferred_live);
        if !queued.is_empty() {
            debug!(session = %self.id, count = queued.len(), "routing live actions queued during catch-up");
        }
        let mut gap = false;
        for action in queued {
            let events = self.router.route(action);
            gap |= self.publish(events);
        }
        if gap && self.router.gap().has_gaps() {
            self.on_gap();
        }
        self.defer_local(Vec::new());
    }

    /// Queue local actions for delivery, flushing the queue when no
    /// catch-up is running.
    fn defer_local(&mut self, mut actions: Vec<Action>) {
        self.deferred_local.append(&mut actions);
        if self.flag.is_held() {
            return;
        }
        let queued = std::mem::take(&mut self.deferred_local);
        if queued.is_empty() {
            return;
        }

        let log = Arc::clone(&self.log);
        let transport = Arc::clone(&self.transport);
        let flag = self.flag.clone();
        let commands = self.commands.clone();
        let session = self.id;
        tokio::spawn(async move {
            let mut queued = queued.into_iter();
            while let Some(action) = queued.next() {
                let delivery =
                    persist_and_send(log.as_ref(), transport.as_ref(), session, &action, &flag)
                        .await;
                if delivery.is_deferred() {
                    // Another catch-up started; hand the rest back.
                    if let Some(commands) = commands.upgrade() {
                        for action in std::iter::once(action).chain(queued) {
                            let _ = commands.send(Command::DeferLocal(action));
                        }
                    }
                    return;
                }
            }
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.router.state().clone(),
            watermark: self.router.watermark().get(),
            pending: self.router.pending().len(),
            gap: self.router.gap().len(),
            missing: self.router.missing(),
            catching_up: self.flag.is_held(),
        }
    }

    /// Publish router events. Returns whether any of them was a gap hold.
    fn publish(&self, events: Vec<RouterEvent>) -> bool {
        let mut gap = false;
        for event in events {
            let event = SessionEvent::from_router(event);
            gap |= event.is_gap();
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        gap
    }

    fn on_gap(&mut self) {
        let watermark = self.router.watermark().get();
        let missing = self.router.missing();
        info!(session = %self.id, %watermark, missing = missing.len(), "gap in live delivery");
        let _ = self
            .events
            .send(SessionEvent::GapDetected { watermark, missing });

        if !self.catch_up.auto_on_gap || self.gap_timer.swap(true, Ordering::AcqRel) {
            return;
        }

        let armed = Arc::clone(&self.gap_timer);
        let handle = self.handle.clone();
        let grace = self.catch_up.gap_grace();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            armed.store(false, Ordering::Release);

            let Some(inner) = handle.upgrade() else {
                return;
            };
            let handle = SessionHandle { inner };
            match handle.snapshot().await {
                Ok(snapshot) if snapshot.gap > 0 => {}
                _ => return,
            }
            match handle.resync().await {
                Ok(report) => {
                    debug!(session = %handle.id(), watermark = %report.watermark(), "gap recovery finished")
                }
                Err(CatchUpError::Busy) => {
                    debug!(session = %handle.id(), "gap recovery skipped, catch-up already running")
                }
                Err(e) => warn!(session = %handle.id(), error = %e, "gap recovery failed"),
            }
        });
    }
}

/// Decode records from the transport and hand them to the worker.
///
/// Undecodable records are dropped one by one; the pump keeps going.
async fn receive_pump(
    session: SessionId,
    transport: Arc<dyn PeerTransport>,
    commands: mpsc::WeakUnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
) {
    loop {
        match transport.recv().await {
            Ok(bytes) => match Action::from_bytes(&bytes) {
                Ok(action) => {
                    let Some(commands) = commands.upgrade() else {
                        break;
                    };
                    if commands.send(Command::Deliver(action)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(%session, error = %e, "dropping undecodable record");
                    let _ = events.send(SessionEvent::Dropped {
                        sequence: None,
                        kind: None,
                        reason: e.to_string(),
                    });
                }
            },
            Err(TransportError::ConnectionClosed) => {
                debug!(%session, "transport closed, receive pump stopped");
                break;
            }
            Err(TransportError::NotConnected) => {
                error!(%session, "transport not connected, receive pump stopped");
                break;
            }
            Err(e) => warn!(%session, error = %e, "receive failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::time::Duration;
    use trick_core::fixtures::scripted_round;
    use trick_log::MemoryActionLog;
    use trick_types::{ChoseBet, Honk, Phase, PlayOrder, StartNewGame, TrumpMode};

    fn quiet_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.catch_up.on_start = false;
        config.catch_up.auto_on_gap = false;
        config
    }

    fn spawn(log: &MemoryActionLog, transport: &MockTransport) -> SessionHandle {
        Session::new(
            SessionId::new(),
            Arc::new(log.clone()),
            Arc::new(transport.clone()),
        )
        .with_config(quiet_config())
        .spawn()
    }

    async fn wait_for_watermark(handle: &SessionHandle, target: u64) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if handle.watermark().await.unwrap().value() >= target {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("watermark never reached target");
    }

    fn seat(n: u8) -> PlayerId {
        PlayerId::new(n).unwrap()
    }

    #[tokio::test]
    async fn submit_sequences_applies_persists_and_broadcasts() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let handle = spawn(&log, &transport);

        let submitted = handle
            .submit(
                seat(0),
                ActionBody::StartNewGame(StartNewGame {
                    rounds: 1,
                    trump_mode: TrumpMode::Declared,
                }),
            )
            .await
            .unwrap();

        assert_eq!(submitted.action.sequence.value(), 1);
        assert!(submitted.delivery.persist.is_done());
        assert!(submitted.delivery.broadcast.is_done());
        assert_eq!(log.len(handle.id()), 1);
        assert_eq!(
            Action::from_bytes(&transport.last_sent().unwrap()).unwrap(),
            submitted.action
        );

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.watermark.value(), 1);
        assert_eq!(snapshot.state.phase, Phase::Dealing);
    }

    #[tokio::test]
    async fn allocation_failure_sends_nothing() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let handle = spawn(&log, &transport);
        log.fail_next_allocation("disk gone");

        let err = handle
            .submit(seat(0), ActionBody::ChoseBet(ChoseBet { bet: 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Allocation(_)));
        assert!(transport.sent_messages().is_empty());
        assert_eq!(handle.watermark().await.unwrap(), Sequence::zero());
    }

    #[tokio::test]
    async fn ephemeral_submit_is_not_sequenced() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let handle = spawn(&log, &transport);
        let mut events = handle.events();

        let submitted = handle
            .submit(seat(0), ActionBody::Honk(Honk { target: seat(1) }))
            .await
            .unwrap();
        assert_eq!(submitted.action.sequence, Sequence::UNSEQUENCED);
        assert_eq!(log.append_count(), 0);
        assert_eq!(transport.sent_messages().len(), 1);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Honk {
                from: seat(0),
                target: seat(1),
            }
        );
        // Nothing was allocated.
        assert_eq!(
            log.allocate_next_sequence(handle.id()).await.unwrap().value(),
            1
        );
    }

    #[tokio::test]
    async fn live_records_are_routed() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let handle = spawn(&log, &transport);

        let script = scripted_round(3, TrumpMode::Declared);
        for action in script.iter().rev() {
            transport.queue_response(action.to_bytes().unwrap());
        }
        wait_for_watermark(&handle, script.len() as u64).await;
        assert_eq!(
            handle.snapshot().await.unwrap().state.phase,
            Phase::AwaitingNewGame
        );
    }

    #[tokio::test]
    async fn undecodable_record_is_dropped_alone() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let handle = spawn(&log, &transport);
        let mut events = handle.events();

        let script = scripted_round(2, TrumpMode::TurnUp);
        transport.queue_response(vec![0xc1, 0xff, 0x00]);
        transport.queue_response(script[0].to_bytes().unwrap());

        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Dropped { sequence: None, .. }
        ));
        wait_for_watermark(&handle, 1).await;
    }

    #[tokio::test]
    async fn local_action_ahead_of_the_watermark_triggers_gap_recovery() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let mut config = quiet_config();
        config.catch_up.auto_on_gap = true;
        config.catch_up.gap_grace_ms = 20;
        let handle = Session::new(
            SessionId::new(),
            Arc::new(log.clone()),
            Arc::new(transport.clone()),
        )
        .with_config(config)
        .spawn();
        let mut events = handle.events();

        // Another peer took sequence 1 and logged it, but its broadcast
        // never arrived.
        let first = log.allocate_next_sequence(handle.id()).await.unwrap();
        let start = Action::new(
            seat(0),
            ActionBody::StartNewGame(StartNewGame {
                rounds: 1,
                trump_mode: TrumpMode::Declared,
            }),
            unix_now(),
            first,
        );
        log.seed(handle.id(), start.to_wire().unwrap());

        let submitted = handle
            .submit(
                seat(1),
                ActionBody::PlayOrder(PlayOrder {
                    order: vec![seat(0), seat(1)],
                }),
            )
            .await
            .unwrap();
        assert_eq!(submitted.action.sequence.value(), 2);

        loop {
            if let SessionEvent::GapDetected { missing, .. } = events.recv().await.unwrap() {
                assert_eq!(missing, vec![Sequence::new(1)]);
                break;
            }
        }
        wait_for_watermark(&handle, 2).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.gap, 0);
        assert!(snapshot.missing.is_empty());
        assert_eq!(snapshot.state.phase, Phase::Dealing);
        assert_eq!(snapshot.state.play_order, vec![seat(0), seat(1)]);
    }

    #[tokio::test]
    async fn catch_up_replays_the_log() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let handle = spawn(&log, &transport);
        log.shuffle_ranges(true);
        for action in scripted_round(3, TrumpMode::Declared) {
            log.seed(handle.id(), action.to_wire().unwrap());
        }

        let report = handle.catch_up(Sequence::new(1), None).await.unwrap();
        assert_eq!(report.decode_failures, 0);
        assert_eq!(report.watermark().value(), report.fetched as u64);
        assert_eq!(*handle.progress().borrow(), 1.0);
        assert!(!handle.is_catching_up());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_watermark_and_zero_progress() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let handle = spawn(&log, &transport);
        for action in scripted_round(2, TrumpMode::Declared) {
            log.seed(handle.id(), action.to_wire().unwrap());
        }
        log.fail_next_range("offline");

        let err = handle.catch_up(Sequence::new(1), None).await.unwrap_err();
        assert!(matches!(err, CatchUpError::Fetch(_)));
        assert_eq!(*handle.progress().borrow(), 0.0);
        assert_eq!(handle.watermark().await.unwrap(), Sequence::zero());

        // Retrying is safe.
        handle.catch_up(Sequence::new(1), None).await.unwrap();
        assert!(handle.watermark().await.unwrap().value() > 0);
    }

    #[tokio::test]
    async fn reset_session_clears_log_counter_and_state() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let handle = spawn(&log, &transport);
        handle
            .submit(
                seat(0),
                ActionBody::StartNewGame(StartNewGame {
                    rounds: 2,
                    trump_mode: TrumpMode::TurnUp,
                }),
            )
            .await
            .unwrap();

        assert_eq!(handle.reset_session().await.unwrap(), 1);
        assert!(log.is_empty(handle.id()));
        assert_eq!(handle.watermark().await.unwrap(), Sequence::zero());
        assert_eq!(
            handle.snapshot().await.unwrap().state,
            GameState::default()
        );
        assert_eq!(
            log.allocate_next_sequence(handle.id()).await.unwrap().value(),
            1
        );
    }

    #[tokio::test]
    async fn close_stops_the_session() {
        let log = MemoryActionLog::new();
        let transport = MockTransport::new();
        let handle = spawn(&log, &transport);
        handle.close().await.unwrap();
        assert!(!transport.is_connected());

        tokio::time::timeout(Duration::from_secs(1), async {
            while handle.snapshot().await.is_ok() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
