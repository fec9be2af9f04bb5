//! Catch-up guard and report.
//!
//! At most one catch-up runs per session. The [`CatchUpFlag`] records
//! whether one is running; the [`CatchUpGuard`] owns the flag for the length
//! of the run and clears it on drop, so every exit path releases it,
//! including failure and a cancelled task.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use trick_core::ReplayReport;
use trick_types::Sequence;

/// Shared "catch-up in progress" flag of one session.
#[derive(Debug, Clone, Default)]
pub struct CatchUpFlag(Arc<AtomicBool>);

impl CatchUpFlag {
    /// A released flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a catch-up currently holds the flag.
    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Take the flag. Returns `None` if it is already held.
    pub fn try_acquire(&self) -> Option<CatchUpGuard> {
        self.try_acquire_with(|| {})
    }

    /// Take the flag and run `on_release` right after it is cleared.
    pub(crate) fn try_acquire_with<F>(&self, on_release: F) -> Option<CatchUpGuard>
    where
        F: FnOnce() + Send + 'static,
    {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CatchUpGuard {
                flag: self.clone(),
                on_release: Some(Box::new(on_release)),
            })
    }
}

/// Exclusive hold on a session's [`CatchUpFlag`].
pub struct CatchUpGuard {
    flag: CatchUpFlag,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl fmt::Debug for CatchUpGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatchUpGuard")
            .field("flag", &self.flag)
            .finish_non_exhaustive()
    }
}

impl Drop for CatchUpGuard {
    fn drop(&mut self) {
        self.flag.0.store(false, Ordering::Release);
        if let Some(on_release) = self.on_release.take() {
            on_release();
        }
    }
}

/// Outcome of one catch-up run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUpReport {
    /// First requested sequence.
    pub from: Sequence,
    /// Last requested sequence, `None` for open-ended.
    pub to: Option<Sequence>,
    /// Records returned by the log.
    pub fetched: usize,
    /// Records that failed to decode and were skipped.
    pub decode_failures: usize,
    /// What the replay pass did with the decoded records.
    pub replay: ReplayReport,
}

impl CatchUpReport {
    /// Watermark after the run.
    pub fn watermark(&self) -> Sequence {
        self.replay.watermark
    }
}
