//! Batched rendering of many elements.
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::dom::Element;

/// Cumulative counts reported after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub successes: usize,
}

/// Result of a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleReport {
    pub total: usize,
    pub processed: usize,
    pub successes: usize,
    /// Pending batches were dropped by [`BatchScheduler::cancel_pending`]
    pub cancelled: bool,
}

/// Dispatches render work in fixed-size batches with a pause between them.
///
/// Elements inside a batch render concurrently and settle independently;
/// batches run one after the other.
#[derive(Debug, Clone, Default)]
pub struct BatchScheduler {
    epoch: Arc<AtomicU64>,
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderable, not yet rendered elements under `container`, in document
    /// order.
    pub fn collect(container: &Element, render_classes: &[String]) -> Vec<Element> {
        container
            .descendants()
            .into_iter()
            .filter(|element| !element.is_marked_rendered() && element.math_source(render_classes).is_some())
            .collect()
    }

    /// Stop every run at its next batch boundary.
    pub fn cancel_pending(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Render `items` batch by batch.
    ///
    /// `on_batch` is called after every batch with cumulative counts. The
    /// pause happens between batches only, never after the last one.
    pub async fn run<T, F, Fut, P>(
        &self,
        items: Vec<T>,
        batch_size: usize,
        delay: Duration,
        mut on_batch: P,
        render: F,
    ) -> ScheduleReport
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = bool>,
        P: FnMut(BatchProgress),
    {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let total = items.len();
        let batch_size = batch_size.max(1);
        let mut report = ScheduleReport {
            total,
            ..ScheduleReport::default()
        };

        let mut batches = items.chunks(batch_size).peekable();
        while let Some(batch) = batches.next() {
            let outcomes = futures::future::join_all(batch.iter().cloned().map(&render)).await;
            report.processed += batch.len();
            report.successes += outcomes.into_iter().filter(|ok| *ok).count();
            on_batch(BatchProgress {
                processed: report.processed,
                total,
                successes: report.successes,
            });

            if batches.peek().is_none() {
                break;
            }
            tokio::time::sleep(delay).await;
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!(processed = report.processed, total, "batch run cancelled");
                report.cancelled = true;
                break;
            }
        }

        report
    }
}
