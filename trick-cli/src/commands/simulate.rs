//! Play a full game between in-process bot peers.
//!
//! Every peer runs its own session over a shared in-memory mesh and the
//! same SQLite log. The last peer drops off the mesh after the first deal
//! and recovers through catch-up once betting is over, so a simulation
//! exercises both live delivery and log replay.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use trick_core::next_move;
use trick_log::{ActionLog, SqliteActionLog};
use trick_session::{CatchUpError, MemoryMesh, Session, SessionConfig, SessionHandle};
use trick_types::{
    ActionBody, Card, Dealer, GameState, PlayOrder, PlayerId, SendDeck, Sequence, SessionId,
    StartNewGame, TrumpMode,
};

use super::{print_state, seat_scores, SeatScore};

/// Cards dealt to each seat.
const HAND_SIZE: u8 = 5;

/// Undealt cards left in the kitty.
const KITTY_SIZE: usize = 4;

/// How long a peer may take to apply an action before the run fails.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct Options {
    pub players: usize,
    pub rounds: u8,
    pub seed: u64,
    pub mode: TrumpMode,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Outcome {
    session: String,
    peers: usize,
    watermark: u64,
    phase: String,
    scores: Vec<SeatScore>,
}

/// Run the simulate command.
pub async fn run(log: Arc<SqliteActionLog>, mut config: SessionConfig, options: Options) -> Result<()> {
    // Peers join an empty session; nothing to catch up on.
    config.catch_up.on_start = false;

    let session = SessionId::new();
    let mut table = Table::open(session, log, &config, options.players);
    info!(%session, players = options.players, rounds = options.rounds, "simulation started");

    let order = table.seats()?;
    let host = order[0];
    table
        .submit(
            host,
            ActionBody::StartNewGame(StartNewGame {
                rounds: options.rounds,
                trump_mode: options.mode,
            }),
        )
        .await?;
    table
        .submit(
            host,
            ActionBody::PlayOrder(PlayOrder {
                order: order.clone(),
            }),
        )
        .await?;

    let mut rng = StdRng::seed_from_u64(options.seed);
    for round in 0..options.rounds as usize {
        let dealer = order[round % order.len()];
        table.submit(dealer, ActionBody::Dealer(Dealer { dealer })).await?;

        let mut deck = Card::full_deck();
        deck.shuffle(&mut rng);
        deck.truncate(order.len() * HAND_SIZE as usize + KITTY_SIZE);
        table
            .submit(
                dealer,
                ActionBody::SendDeck(SendDeck {
                    deck,
                    hand_size: HAND_SIZE,
                }),
            )
            .await?;

        if round == 0 {
            table.disconnect(order.len() - 1);
        }

        let mut moves = 0;
        while let Some((player, body)) = next_move(&table.host_state().await?) {
            table.submit(player, body).await?;
            moves += 1;
            if moves == order.len() {
                table.reconnect().await?;
            }
        }
        table.reconnect().await?;
    }

    let state = table.converge().await?;
    let watermark = table.peers[0].watermark().await?;
    table.close().await;

    if options.json {
        let outcome = Outcome {
            session: session.to_string(),
            peers: options.players,
            watermark: watermark.value(),
            phase: state.phase.to_string(),
            scores: seat_scores(&state),
        };
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("=== trickline simulate ===");
        println!();
        println!("Session:   {}", session);
        println!("Peers:     {} (all converged)", options.players);
        println!("Watermark: {}", watermark);
        print_state(&state);
    }

    Ok(())
}

/// The peers of one simulated session.
struct Table {
    mesh: MemoryMesh,
    peers: Vec<SessionHandle>,
    mesh_ids: Vec<usize>,
    offline: Option<usize>,
}

impl Table {
    fn open(session: SessionId, log: Arc<SqliteActionLog>, config: &SessionConfig, players: usize) -> Self {
        let mesh = MemoryMesh::new();
        let mut peers = Vec::with_capacity(players);
        let mut mesh_ids = Vec::with_capacity(players);
        for _ in 0..players {
            let transport = mesh.join();
            mesh_ids.push(transport.peer_id());
            let log: Arc<dyn ActionLog> = log.clone();
            peers.push(
                Session::new(session, log, Arc::new(transport))
                    .with_config(config.clone())
                    .spawn(),
            );
        }
        Self {
            mesh,
            peers,
            mesh_ids,
            offline: None,
        }
    }

    /// One seat per peer, peer `i` playing seat `i`.
    fn seats(&self) -> Result<Vec<PlayerId>> {
        (0..self.peers.len())
            .map(|seat| {
                let seat = u8::try_from(seat).context("too many peers")?;
                Ok(PlayerId::new(seat)?)
            })
            .collect()
    }

    async fn host_state(&self) -> Result<GameState> {
        Ok(self.peers[0].snapshot().await?.state)
    }

    /// Submit through the seat's own peer, or through the host while that
    /// peer is off the mesh, then wait for every online peer to apply it.
    async fn submit(&self, player: PlayerId, body: ActionBody) -> Result<Sequence> {
        let seat = player.seat() as usize;
        let via = if self.offline == Some(seat) { 0 } else { seat };
        let submitted = self.peers[via].submit(player, body).await?;
        let sequence = submitted.action.sequence;
        if !submitted.delivery.persist.is_done() {
            warn!(%sequence, outcome = ?submitted.delivery.persist, "action not persisted");
        }
        for (idx, peer) in self.peers.iter().enumerate() {
            if self.offline != Some(idx) {
                settle(peer, sequence).await?;
            }
        }
        Ok(sequence)
    }

    fn disconnect(&mut self, peer: usize) {
        if self.mesh.disconnect(self.mesh_ids[peer]) {
            info!(peer, "peer dropped off the mesh");
            self.offline = Some(peer);
        }
    }

    /// Bring the offline peer back and catch it up from the log.
    async fn reconnect(&mut self) -> Result<()> {
        let Some(peer) = self.offline.take() else {
            return Ok(());
        };
        self.mesh.connect(self.mesh_ids[peer]);
        let handle = &self.peers[peer];
        match handle.resync().await {
            Ok(report) => {
                info!(peer, fetched = report.fetched, watermark = %report.watermark(), "peer caught up");
            }
            // Gap recovery got there first.
            Err(CatchUpError::Busy) => {}
            Err(e) => return Err(e).context("catch-up after reconnect failed"),
        }
        let target = self.peers[0].watermark().await?;
        settle(handle, target).await
    }

    /// Resync every peer and check they all hold the host's state.
    async fn converge(&self) -> Result<GameState> {
        let expected = self.peers[0].snapshot().await?;
        for (idx, peer) in self.peers.iter().enumerate().skip(1) {
            match peer.resync().await {
                Ok(_) | Err(CatchUpError::Busy) => {}
                Err(e) => return Err(e).with_context(|| format!("peer {idx} resync failed")),
            }
            settle(peer, expected.watermark).await?;
            let view = peer.snapshot().await?;
            if view.state != expected.state {
                bail!(
                    "peer {idx} diverged at watermark {} (phase {} vs {})",
                    view.watermark,
                    view.state.phase,
                    expected.state.phase
                );
            }
        }
        Ok(expected.state)
    }

    async fn close(&self) {
        for peer in &self.peers {
            if let Err(e) = peer.close().await {
                warn!(error = %e, "failed to close peer");
            }
        }
    }
}

/// Wait until `peer` has applied everything up to `target`.
async fn settle(peer: &SessionHandle, target: Sequence) -> Result<()> {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        loop {
            if peer.watermark().await? >= target {
                return Ok::<_, anyhow::Error>(());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .with_context(|| format!("timed out waiting for watermark {target}"))?
}
