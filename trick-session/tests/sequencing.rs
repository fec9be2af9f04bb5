//! Sequence allocation across sessions sharing one SQLite log, and
//! order-independence of live delivery.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{quiet_config, spawn_session, watermark_reaches};
use proptest::prelude::*;
use trick_core::fixtures::scripted_round;
use trick_core::Router;
use trick_log::{ActionLog, SqliteActionLog};
use trickline_session::{MockTransport, Sequencer, SequencerConfig};
use trick_types::{ActionBody, ChoseBet, PlayerId, Sequence, SessionId, TrumpMode};

fn generous() -> SequencerConfig {
    SequencerConfig {
        max_retries: 50,
        retry_backoff_ms: 2,
    }
}

#[tokio::test]
async fn concurrent_allocations_are_distinct_and_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let log: Arc<dyn ActionLog> =
        Arc::new(SqliteActionLog::new(&dir.path().join("log.db"), 4).await.unwrap());
    let sequencer = Sequencer::new(log, &generous());
    let session = SessionId::new();

    let tasks: Vec<_> = (0..24)
        .map(|_| {
            let sequencer = sequencer.clone();
            tokio::spawn(async move { sequencer.allocate(session).await.unwrap().value() })
        })
        .collect();

    let mut seen = BTreeSet::new();
    for task in tasks {
        assert!(seen.insert(task.await.unwrap()), "duplicate sequence");
    }
    assert_eq!(seen, (1..=24).collect());
}

#[tokio::test]
async fn peers_submitting_at_once_share_one_counter() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = Arc::new(SqliteActionLog::new(&dir.path().join("log.db"), 4).await.unwrap());
    let session = SessionId::new();
    let mut config = quiet_config();
    config.sequencer = generous();

    let peers: Vec<_> = (0..3)
        .map(|_| {
            let log: Arc<dyn ActionLog> = sqlite.clone();
            spawn_session(session, log, Arc::new(MockTransport::new()), config.clone())
        })
        .collect();

    let tasks: Vec<_> = peers
        .iter()
        .enumerate()
        .flat_map(|(seat, peer)| {
            (0..4).map(move |bet| {
                let peer = peer.clone();
                tokio::spawn(async move {
                    peer.submit(
                        PlayerId::new(seat as u8).unwrap(),
                        ActionBody::ChoseBet(ChoseBet { bet }),
                    )
                    .await
                    .unwrap()
                })
            })
        })
        .collect();

    let mut seen = BTreeSet::new();
    for task in tasks {
        let submitted = task.await.unwrap();
        assert!(submitted.delivery.persist.is_done());
        seen.insert(submitted.action.sequence.value());
    }
    assert_eq!(seen, (1..=12).collect());
    assert_eq!(
        sqlite.range(session, Sequence::new(1), None).await.unwrap().len(),
        12
    );
}

#[tokio::test]
async fn reset_then_allocate_returns_one() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = Arc::new(SqliteActionLog::new(&dir.path().join("log.db"), 2).await.unwrap());
    let session = SessionId::new();
    let handle = spawn_session(
        session,
        sqlite.clone(),
        Arc::new(MockTransport::new()),
        quiet_config(),
    );
    for action in scripted_round(2, TrumpMode::Declared).into_iter().take(3) {
        handle.submit(action.player, action.body).await.unwrap();
    }

    assert_eq!(handle.reset_session().await.unwrap(), 3);
    let sequencer = Sequencer::new(sqlite, &generous());
    assert_eq!(sequencer.allocate(session).await.unwrap().value(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn live_delivery_order_does_not_matter(
        order in Just((0..scripted_round(3, TrumpMode::TurnUp).len()).collect::<Vec<_>>())
            .prop_shuffle(),
    ) {
        let script = scripted_round(3, TrumpMode::TurnUp);
        let mut expected = Router::new();
        for action in &script {
            expected.route(action.clone());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (state, watermark) = runtime.block_on(async {
            let transport = MockTransport::new();
            let handle = spawn_session(
                SessionId::new(),
                Arc::new(trick_log::MemoryActionLog::new()),
                Arc::new(transport.clone()),
                quiet_config(),
            );
            for idx in &order {
                transport.queue_response(script[*idx].to_bytes().unwrap());
            }
            watermark_reaches(&handle, script.len() as u64).await;
            let snapshot = handle.snapshot().await.unwrap();
            (snapshot.state, snapshot.watermark)
        });

        prop_assert_eq!(&state, expected.state());
        prop_assert_eq!(watermark, expected.watermark().get());
    }
}
