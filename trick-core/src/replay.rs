//! Catch-up replay pass.
//!
//! [`replay`] feeds a batch of logged actions through a [`Router`]. The log
//! gives no ordering guarantee, so the batch is sorted first. Each entry is
//! then classified against the watermark: the next sequence is admitted,
//! anything further ahead is held in the gap buffer, anything at or below
//! the watermark is skipped. When the batch is exhausted the gap buffer is
//! drained.

use trick_types::{Action, Sequence};

use crate::router::{Admission, Router, RouterEvent};

/// Replay progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Entries handled so far.
    pub processed: usize,
    /// Entries in the batch.
    pub total: usize,
}

impl Progress {
    /// Completion fraction in `[0.0, 1.0]`. An empty batch counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Outcome of a replay pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplayReport {
    /// Entries in the batch.
    pub fetched: usize,
    /// Entries admitted in batch order.
    pub admitted: usize,
    /// Entries held in the gap buffer while the batch was walked.
    pub held: usize,
    /// Entries at or below the watermark, or unsequenced.
    pub skipped: usize,
    /// Held entries admitted by the final drain.
    pub drained: usize,
    /// Watermark after the pass.
    pub watermark: Sequence,
}

/// Replay a batch of logged actions.
///
/// `on_progress` is called once per entry.
pub fn replay<F>(
    router: &mut Router,
    mut entries: Vec<Action>,
    mut on_progress: F,
) -> (ReplayReport, Vec<RouterEvent>)
where
    F: FnMut(Progress),
{
    entries.sort_by_key(Action::ordering_key);

    let total = entries.len();
    let mut report = ReplayReport {
        fetched: total,
        ..ReplayReport::default()
    };
    let mut events = Vec::new();

    for (idx, action) in entries.into_iter().enumerate() {
        if action.is_ephemeral() {
            report.skipped += 1;
        } else {
            match router.classify(action.sequence) {
                Admission::Next => {
                    router.admit(action, &mut events);
                    report.admitted += 1;
                }
                Admission::Ahead => {
                    router.hold(action, &mut events);
                    report.held += 1;
                }
                Admission::Duplicate => report.skipped += 1,
            }
        }
        on_progress(Progress {
            processed: idx + 1,
            total,
        });
    }

    report.drained = router.drain_gaps(&mut events);
    report.watermark = router.watermark().get();
    (report, events)
}
