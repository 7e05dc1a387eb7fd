//! Sequential batch runner with per-item isolation.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use mg_core::{ApplyOutcome, BatchSummary, MediaItem};

/// Applies an artifact to a single item.
///
/// An `Err` is counted as a failure exactly like [`ApplyOutcome::Failed`];
/// the distinction only matters for logging.
#[async_trait]
pub trait Applier: Send + Sync {
    async fn apply(&self, item: &MediaItem) -> anyhow::Result<ApplyOutcome>;
}

/// Called after every item with `(index, total, item, outcome)`; `index`
/// starts at 1.
pub type ProgressFn<'a> = dyn Fn(usize, usize, &MediaItem, &ApplyOutcome) + Send + Sync + 'a;

/// Apply `applier` to every item in order. Errors and panics in one item
/// are recorded as failures and never stop the batch.
pub async fn run_batch(
    items: &[MediaItem],
    applier: &dyn Applier,
    progress: Option<&ProgressFn<'_>>,
) -> BatchSummary {
    let total = items.len();
    let mut summary = BatchSummary::default();
    tracing::info!(total, "Starting batch");

    for (i, item) in items.iter().enumerate() {
        let outcome = match AssertUnwindSafe(applier.apply(item)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => ApplyOutcome::failed(format!("{e:#}")),
            Err(panic) => ApplyOutcome::failed(panic_message(panic.as_ref())),
        };

        match &outcome {
            ApplyOutcome::Failed(reason) => {
                tracing::error!(title = %item.title, path = %item.path.display(), "Failed: {reason}");
            }
            ApplyOutcome::SkippedAlreadyDone => {
                tracing::debug!(title = %item.title, "Already done, skipping");
            }
            ApplyOutcome::Applied => {
                tracing::info!(title = %item.title, "Applied");
            }
        }

        summary.record(&outcome);
        if let Some(progress) = progress {
            progress(i + 1, total, item, &outcome);
        }
    }

    tracing::info!("Batch complete: {summary}");
    summary
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked: {detail}")
}

/// Single in-progress flag. A second run while one is active is refused,
/// not queued.
#[derive(Debug, Default)]
pub struct RunGate {
    active: AtomicBool,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate, or `None` if a run is already in progress.
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { gate: self })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the [`RunGate`] when dropped, including on unwind.
#[derive(Debug)]
pub struct RunPermit<'a> {
    gate: &'a RunGate,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.gate.active.store(false, Ordering::Release);
    }
}
