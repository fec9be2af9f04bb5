//! SQLite action log backend.

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use trick_types::{ActionKind, PlayerId, Sequence, SessionId, WireAction};

use crate::{ActionLog, CorruptRow, LogError, RangeBatch};

/// SQLite-based action log.
///
/// Uses WAL mode for concurrent reads/writes. The sequence counter lives in
/// its own table and is bumped inside a transaction, so every process
/// sharing the database file allocates from the same counter.
#[derive(Clone)]
pub struct SqliteActionLog {
    pool: SqlitePool,
}

impl SqliteActionLog {
    /// Open (or create) a log at the given path.
    pub async fn new(path: &Path, max_connections: u32) -> Result<Self, LogError> {
        let url = path.to_str().ok_or_else(|| LogError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let log = Self { pool };
        log.run_migrations().await?;
        tracing::debug!(path = %path.display(), "opened sqlite action log");
        Ok(log)
    }

    /// Create an in-memory log (for testing).
    pub async fn in_memory() -> Result<Self, LogError> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let log = Self { pool };
        log.run_migrations().await?;
        Ok(log)
    }

    async fn run_migrations(&self) -> Result<(), LogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_sequences (
                session_id BLOB PRIMARY KEY,
                next_sequence INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS actions (
                session_id BLOB NOT NULL,
                sequence INTEGER NOT NULL,
                player_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                payload BLOB NOT NULL,
                timestamp INTEGER NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                UNIQUE(session_id, sequence)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_actions_session_sequence ON actions(session_id, sequence)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn stored_at(
        &self,
        session: SessionId,
        sequence: Sequence,
    ) -> Result<Option<WireAction>, LogError> {
        let row = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT sequence, player_id, kind, payload, timestamp
            FROM actions
            WHERE session_id = ?1 AND sequence = ?2
            "#,
        )
        .bind(session.as_bytes())
        .bind(sequence.value() as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LogError::from_sqlx(session, e))?;

        row.map(WireAction::try_from).transpose()
    }
}

#[async_trait]
impl ActionLog for SqliteActionLog {
    async fn append(&self, session: SessionId, action: &WireAction) -> Result<(), LogError> {
        if action.kind.is_ephemeral() {
            return Err(LogError::Ephemeral(action.kind));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO actions (session_id, sequence, player_id, kind, payload, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(session_id, sequence) DO NOTHING
            "#,
        )
        .bind(session.as_bytes())
        .bind(action.sequence.value() as i64)
        .bind(i64::from(action.player_id.seat()))
        .bind(action.kind.as_str())
        .bind(&action.payload)
        .bind(action.timestamp as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| LogError::from_sqlx(session, e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Re-append of the same record is idempotent.
        match self.stored_at(session, action.sequence).await? {
            Some(existing) if existing == *action => Ok(()),
            _ => Err(LogError::SequenceTaken {
                sequence: action.sequence,
            }),
        }
    }

    async fn range(
        &self,
        session: SessionId,
        from: Sequence,
        to: Option<Sequence>,
    ) -> Result<RangeBatch, LogError> {
        let rows = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT sequence, player_id, kind, payload, timestamp
            FROM actions
            WHERE session_id = ?1 AND sequence >= ?2 AND (?3 IS NULL OR sequence <= ?3)
            "#,
        )
        .bind(session.as_bytes())
        .bind(from.value() as i64)
        .bind(to.map(|s| s.value() as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LogError::from_sqlx(session, e))?;

        let mut batch = RangeBatch::default();
        for row in rows {
            let sequence = row.sequence;
            match WireAction::try_from(row) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    tracing::warn!(%session, sequence, error = %e, "skipping corrupt action row");
                    batch.corrupt.push(CorruptRow {
                        sequence: u64::try_from(sequence).ok().map(Sequence::new),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(batch)
    }

    async fn allocate_next_sequence(&self, session: SessionId) -> Result<Sequence, LogError> {
        let map = |e| LogError::from_sqlx(session, e);
        let mut tx = self.pool.begin().await.map_err(map)?;

        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO session_sequences (session_id, next_sequence)
            VALUES (?1, 2)
            ON CONFLICT(session_id) DO UPDATE SET next_sequence = next_sequence + 1
            RETURNING next_sequence - 1
            "#,
        )
        .bind(session.as_bytes())
        .fetch_one(&mut *tx)
        .await
        .map_err(map)?;

        tx.commit().await.map_err(map)?;
        Ok(Sequence::new(sequence as u64))
    }

    async fn reset_sequence(&self, session: SessionId) -> Result<(), LogError> {
        sqlx::query("DELETE FROM session_sequences WHERE session_id = ?1")
            .bind(session.as_bytes())
            .execute(&self.pool)
            .await
            .map_err(|e| LogError::from_sqlx(session, e))?;
        tracing::debug!(%session, "sequence counter reset");
        Ok(())
    }

    async fn delete_all(&self, session: SessionId, batch_size: u32) -> Result<u64, LogError> {
        let mut total = 0;
        loop {
            let result = sqlx::query(
                r#"
                DELETE FROM actions WHERE rowid IN (
                    SELECT rowid FROM actions WHERE session_id = ?1 LIMIT ?2
                )
                "#,
            )
            .bind(session.as_bytes())
            .bind(i64::from(batch_size.max(1)))
            .execute(&self.pool)
            .await
            .map_err(|e| LogError::from_sqlx(session, e))?;

            let deleted = result.rows_affected();
            if deleted == 0 {
                break;
            }
            total += deleted;
            tracing::debug!(%session, deleted, total, "deleted action batch");
        }
        Ok(total)
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct ActionRow {
    sequence: i64,
    player_id: i64,
    kind: String,
    payload: Vec<u8>,
    timestamp: i64,
}

impl TryFrom<ActionRow> for WireAction {
    type Error = LogError;

    fn try_from(row: ActionRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| LogError::Corrupt {
            sequence: row.sequence,
            reason,
        };
        let seat = u8::try_from(row.player_id).map_err(|e| corrupt(e.to_string()))?;
        let player_id = PlayerId::new(seat).map_err(|e| corrupt(e.to_string()))?;
        let kind = ActionKind::from_str(&row.kind).map_err(|e| corrupt(e.to_string()))?;
        let sequence = u64::try_from(row.sequence).map_err(|e| corrupt(e.to_string()))?;

        Ok(WireAction {
            player_id,
            kind,
            payload: row.payload,
            timestamp: row.timestamp.max(0) as u64,
            sequence: Sequence::new(sequence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn wire(sequence: u64, kind: ActionKind) -> WireAction {
        WireAction {
            player_id: PlayerId::new(1).unwrap(),
            kind,
            payload: vec![0x91, 0x01],
            timestamp: 1_705_000_000,
            sequence: Sequence::new(sequence),
        }
    }

    #[tokio::test]
    async fn allocation_starts_at_one_and_increments() {
        let log = SqliteActionLog::in_memory().await.unwrap();
        let session = SessionId::new();

        for expected in 1..=3 {
            let seq = log.allocate_next_sequence(session).await.unwrap();
            assert_eq!(seq.value(), expected);
        }
    }

    #[tokio::test]
    async fn counters_are_independent_per_session() {
        let log = SqliteActionLog::in_memory().await.unwrap();
        let a = SessionId::new();
        let b = SessionId::new();

        assert_eq!(log.allocate_next_sequence(a).await.unwrap().value(), 1);
        assert_eq!(log.allocate_next_sequence(b).await.unwrap().value(), 1);
        assert_eq!(log.allocate_next_sequence(a).await.unwrap().value(), 2);
    }

    #[tokio::test]
    async fn reset_then_allocate_returns_one() {
        let log = SqliteActionLog::in_memory().await.unwrap();
        let session = SessionId::new();
        for _ in 0..4 {
            log.allocate_next_sequence(session).await.unwrap();
        }
        log.reset_sequence(session).await.unwrap();
        assert_eq!(log.allocate_next_sequence(session).await.unwrap().value(), 1);
    }

    #[tokio::test]
    async fn range_is_inclusive_and_open_ended() {
        let log = SqliteActionLog::in_memory().await.unwrap();
        let session = SessionId::new();
        for seq in 1..=6 {
            log.append(session, &wire(seq, ActionKind::ChoseBet))
                .await
                .unwrap();
        }

        let mut bounded: Vec<u64> = log
            .range(session, Sequence::new(2), Some(Sequence::new(4)))
            .await
            .unwrap()
            .records
            .iter()
            .map(|w| w.sequence.value())
            .collect();
        bounded.sort_unstable();
        assert_eq!(bounded, vec![2, 3, 4]);

        let open = log.range(session, Sequence::new(5), None).await.unwrap();
        assert_eq!(open.len(), 2);
    }

    #[tokio::test]
    async fn stored_record_roundtrips() {
        let log = SqliteActionLog::in_memory().await.unwrap();
        let session = SessionId::new();
        let record = wire(1, ActionKind::PlayCard);
        log.append(session, &record).await.unwrap();

        let stored = log.range(session, Sequence::new(1), None).await.unwrap();
        assert_eq!(stored.records, vec![record]);
        assert!(stored.corrupt.is_empty());
    }

    #[tokio::test]
    async fn corrupt_row_is_skipped_and_reported() {
        let log = SqliteActionLog::in_memory().await.unwrap();
        let session = SessionId::new();
        for seq in 1..=3 {
            log.append(session, &wire(seq, ActionKind::ChoseBet))
                .await
                .unwrap();
        }
        // Written by something other than this log: seat 9 does not exist.
        sqlx::query(
            r#"
            INSERT INTO actions (session_id, sequence, player_id, kind, payload, timestamp)
            VALUES (?1, 4, 9, 'choseBet', X'9101', 0)
            "#,
        )
        .bind(session.as_bytes())
        .execute(&log.pool)
        .await
        .unwrap();
        sqlx::query(
            r#"
            INSERT INTO actions (session_id, sequence, player_id, kind, payload, timestamp)
            VALUES (?1, 5, 1, 'shuffleDeck', X'90', 0)
            "#,
        )
        .bind(session.as_bytes())
        .execute(&log.pool)
        .await
        .unwrap();

        let batch = log.range(session, Sequence::new(1), None).await.unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(batch.records.len(), 3);

        let mut corrupt: Vec<_> = batch.corrupt.iter().map(|row| row.sequence).collect();
        corrupt.sort_unstable();
        assert_eq!(corrupt, vec![Some(Sequence::new(4)), Some(Sequence::new(5))]);
        assert!(batch
            .corrupt
            .iter()
            .any(|row| row.reason.contains("invalid player id: 9")));
    }

    #[tokio::test]
    async fn reappend_is_idempotent_but_conflicting_record_fails() {
        let log = SqliteActionLog::in_memory().await.unwrap();
        let session = SessionId::new();
        let record = wire(3, ActionKind::ChoseBet);

        log.append(session, &record).await.unwrap();
        log.append(session, &record).await.unwrap();
        assert_eq!(log.range(session, Sequence::new(1), None).await.unwrap().len(), 1);

        let other = wire(3, ActionKind::Discard);
        let err = log.append(session, &other).await.unwrap_err();
        assert!(matches!(err, LogError::SequenceTaken { .. }));
    }

    #[tokio::test]
    async fn ephemeral_kinds_are_refused() {
        let log = SqliteActionLog::in_memory().await.unwrap();
        let err = log
            .append(SessionId::new(), &wire(0, ActionKind::Honk))
            .await
            .unwrap_err();
        assert!(matches!(err, LogError::Ephemeral(ActionKind::Honk)));
    }

    #[tokio::test]
    async fn delete_all_works_in_batches() {
        let log = SqliteActionLog::in_memory().await.unwrap();
        let session = SessionId::new();
        let keep = SessionId::new();
        for seq in 1..=7 {
            log.append(session, &wire(seq, ActionKind::ChoseBet))
                .await
                .unwrap();
        }
        log.append(keep, &wire(1, ActionKind::ChoseBet))
            .await
            .unwrap();

        let deleted = log.delete_all(session, 3).await.unwrap();
        assert_eq!(deleted, 7);
        assert!(log
            .range(session, Sequence::new(1), None)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(log.range(keep, Sequence::new(1), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_allocations_are_distinct_and_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actions.db");
        let log = Arc::new(SqliteActionLog::new(&path, 5).await.unwrap());
        let session = SessionId::new();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                loop {
                    match log.allocate_next_sequence(session).await {
                        Ok(seq) => return seq.value(),
                        Err(e) if e.is_conflict() => tokio::task::yield_now().await,
                        Err(e) => panic!("allocation failed: {e}"),
                    }
                }
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }
        values.sort_unstable();
        assert_eq!(values, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn counter_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actions.db");
        let session = SessionId::new();
        {
            let log = SqliteActionLog::new(&path, 2).await.unwrap();
            log.allocate_next_sequence(session).await.unwrap();
            log.allocate_next_sequence(session).await.unwrap();
        }
        let log = SqliteActionLog::new(&path, 2).await.unwrap();
        assert_eq!(log.allocate_next_sequence(session).await.unwrap().value(), 3);
    }
}
