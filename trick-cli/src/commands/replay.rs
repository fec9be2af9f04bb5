//! Rebuild a session's state from the action log.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use trick_log::{ActionLog, SqliteActionLog};
use trick_session::{MemoryMesh, Session, SessionConfig};
use trick_types::{Sequence, SessionId};

use super::{print_state, seat_scores, SeatScore};

#[derive(Debug, Serialize)]
struct Rebuilt {
    session: String,
    fetched: usize,
    decode_failures: usize,
    admitted: usize,
    held: usize,
    watermark: u64,
    missing: Vec<u64>,
    phase: String,
    scores: Vec<SeatScore>,
}

/// Run the replay command.
pub async fn run(
    log: Arc<SqliteActionLog>,
    mut config: SessionConfig,
    session: SessionId,
    json: bool,
) -> Result<()> {
    // A lone peer with no live traffic; catch-up is driven explicitly.
    config.catch_up.on_start = false;
    config.catch_up.auto_on_gap = false;

    let mesh = MemoryMesh::new();
    let log: Arc<dyn ActionLog> = log;
    let handle = Session::new(session, log, Arc::new(mesh.join()))
        .with_config(config)
        .spawn();

    let report = handle
        .catch_up(Sequence::new(1), None)
        .await
        .context("catch-up from the action log failed")?;
    let snapshot = handle.snapshot().await?;
    handle.close().await?;

    if json {
        let rebuilt = Rebuilt {
            session: session.to_string(),
            fetched: report.fetched,
            decode_failures: report.decode_failures,
            admitted: report.replay.admitted + report.replay.drained,
            held: snapshot.gap,
            watermark: snapshot.watermark.value(),
            missing: snapshot.missing.iter().map(|s| s.value()).collect(),
            phase: snapshot.state.phase.to_string(),
            scores: seat_scores(&snapshot.state),
        };
        println!("{}", serde_json::to_string_pretty(&rebuilt)?);
        return Ok(());
    }

    println!("=== trickline replay ===");
    println!();
    println!("Session:   {}", session);
    if report.fetched == 0 {
        println!("Log:       EMPTY");
        return Ok(());
    }
    println!("Fetched:   {} actions", report.fetched);
    if report.decode_failures > 0 {
        println!("Skipped:   {} undecodable", report.decode_failures);
    }
    println!("Watermark: {}", snapshot.watermark);
    if !snapshot.missing.is_empty() {
        let missing: Vec<String> = snapshot.missing.iter().map(|s| s.to_string()).collect();
        println!("Missing:   {}", missing.join(", "));
        println!("Held:      {} actions behind the gap", snapshot.gap);
    }
    print_state(&snapshot.state);

    Ok(())
}
