//! Chunked bulk executor.
//!
//! Items are split into fixed-width chunks. Chunks run strictly one
//! after another; the items of one chunk run concurrently. Every item
//! reports one progress step, and its outcome is handed back by position
//! without failing the batch.

use futures::future::join_all;
use log::debug;
use std::future::Future;

use super::progress::ProgressReporter;
use super::types::{InterchangeError, InterchangeResult};

/// Counts of a finished bulk run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct BulkRunner<'a> {
    chunk_size: usize,
    progress: &'a dyn ProgressReporter,
}

impl<'a> BulkRunner<'a> {
    pub fn new(chunk_size: usize, progress: &'a dyn ProgressReporter) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            progress,
        }
    }

    /// Run `op` over `items`, calling `on_success` / `on_error` with the
    /// item's position once its chunk has settled.
    pub async fn run_with_callbacks<I, T, F, Fut, S, E>(
        &self,
        items: Vec<I>,
        label: &str,
        op: F,
        mut on_success: S,
        mut on_error: E,
    ) -> BulkSummary
    where
        F: Fn(usize, I) -> Fut,
        Fut: Future<Output = InterchangeResult<T>>,
        S: FnMut(usize, T),
        E: FnMut(usize, InterchangeError),
    {
        let total = items.len();
        let mut summary = BulkSummary::default();
        let mut pending = items.into_iter().enumerate().peekable();
        let mut chunk_index = 0;

        while pending.peek().is_some() {
            let chunk: Vec<(usize, I)> = pending.by_ref().take(self.chunk_size).collect();
            debug!(
                "{}: chunk {} ({} items, {} total)",
                label,
                chunk_index,
                chunk.len(),
                total
            );
            chunk_index += 1;

            let futures = chunk.into_iter().map(|(position, item)| {
                let fut = op(position, item);
                async move {
                    let outcome = fut.await;
                    self.progress.finish_step(Some(label), false);
                    (position, outcome)
                }
            });

            for (position, outcome) in join_all(futures).await {
                match outcome {
                    Ok(value) => {
                        summary.succeeded += 1;
                        on_success(position, value);
                    }
                    Err(e) => {
                        summary.failed += 1;
                        on_error(position, e);
                    }
                }
            }
        }

        summary
    }

    /// Run `op` over `items` and collect every outcome in input order.
    pub async fn run<I, T, F, Fut>(
        &self,
        items: Vec<I>,
        label: &str,
        op: F,
    ) -> Vec<InterchangeResult<T>>
    where
        F: Fn(usize, I) -> Fut,
        Fut: Future<Output = InterchangeResult<T>>,
    {
        let mut outcomes: Vec<Option<InterchangeResult<T>>> = Vec::new();
        outcomes.resize_with(items.len(), || None);
        // Callbacks cannot both borrow `outcomes` mutably; route through a cell.
        let slots = std::cell::RefCell::new(outcomes);
        self.run_with_callbacks(
            items,
            label,
            op,
            |pos, value| slots.borrow_mut()[pos] = Some(Ok(value)),
            |pos, err| slots.borrow_mut()[pos] = Some(Err(err)),
        )
        .await;
        slots
            .into_inner()
            .into_iter()
            .map(|o| o.unwrap_or_else(|| Err(InterchangeError::remote("Bulk item did not run"))))
            .collect()
    }
}
