//! Delete a session's actions and reset its sequence counter.

use anyhow::{Context, Result};
use std::sync::Arc;

use trick_log::{ActionLog, SqliteActionLog};
use trick_session::{MemoryMesh, Session, SessionConfig};
use trick_types::SessionId;

/// Run the reset command.
pub async fn run(log: Arc<SqliteActionLog>, mut config: SessionConfig, session: SessionId) -> Result<()> {
    config.catch_up.on_start = false;
    config.catch_up.auto_on_gap = false;

    let mesh = MemoryMesh::new();
    let log: Arc<dyn ActionLog> = log;
    let handle = Session::new(session, log, Arc::new(mesh.join()))
        .with_config(config)
        .spawn();

    let deleted = handle
        .reset_session()
        .await
        .with_context(|| format!("failed to reset session {session}"))?;
    handle.close().await?;

    println!("Session {} reset: {} actions deleted.", session, deleted);
    println!("The next action will be sequence 1.");

    Ok(())
}
