//! Dependency-ordered resolution engine.
//!
//! Items whose in-batch dependency is not yet registered are deferred to the
//! back of a FIFO worklist. Every pop counts against a global iteration
//! ceiling, so a reference cycle (or a dependency that never appears) ends
//! the batch instead of looping forever; whatever is left is reported with
//! the reference it waited on.
//!
//! The engine knows nothing about asset kinds. A [`BatchStep`] decides per
//! item whether it can be translated now.

mod work;

pub use work::{EngineReport, PendingWorkItem, StepOutcome};

use std::collections::VecDeque;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Default iteration ceiling.
pub const DEFAULT_MAX_ITERATIONS: usize = 50_000;

/// Per-item translation logic driven by the engine.
#[async_trait]
pub trait BatchStep: Send + Sync {
    type Item: Send;
    type Output: Send;

    /// Display name of an item.
    fn label(&self, item: &Self::Item) -> String;

    /// Translate and register an item, or defer it.
    ///
    /// An `Err` drops the item from the batch; the rest continues.
    async fn process(&self, item: &mut Self::Item) -> Result<StepOutcome<Self::Output>>;
}

/// FIFO worklist with a bounded number of iterations.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionEngine {
    max_iterations: usize,
}

impl Default for ResolutionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

impl ResolutionEngine {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Process `items` in order until the worklist is empty or the ceiling
    /// is reached.
    pub async fn run<S>(&self, step: &S, items: Vec<S::Item>) -> EngineReport<S::Item, S::Output>
    where
        S: BatchStep,
    {
        let mut queue: VecDeque<PendingWorkItem<S::Item>> = items
            .into_iter()
            .map(|item| {
                let label = step.label(&item);
                PendingWorkItem::new(item, label)
            })
            .collect();
        let mut report = EngineReport::new();

        while let Some(mut work) = queue.pop_front() {
            if report.iterations >= self.max_iterations {
                queue.push_front(work);
                report.ceiling_exceeded = true;
                warn!(
                    "Iteration ceiling {} exceeded, {} items unresolved",
                    self.max_iterations,
                    queue.len()
                );
                break;
            }
            report.iterations += 1;

            match step.process(&mut work.item).await {
                Ok(StepOutcome::Completed(output)) => {
                    debug!("{}: done after {} requeues", work.label, work.requeues);
                    report.completed.push(output);
                }
                Ok(StepOutcome::Deferred { waiting_on }) => {
                    debug!("{}: waiting on {}, requeued", work.label, waiting_on);
                    work.requeues += 1;
                    work.waiting_on = Some(waiting_on);
                    report.requeues += 1;
                    queue.push_back(work);
                }
                Err(e) => {
                    warn!("{}: {}", work.label, e);
                    report.failed.push((work.label, e));
                }
            }
        }

        report.unresolved = queue.into_iter().collect();
        info!(
            "Batch finished: {} completed, {} failed, {} unresolved in {} iterations ({} requeues)",
            report.completed.len(),
            report.failed.len(),
            report.unresolved.len(),
            report.iterations,
            report.requeues
        );
        report
    }
}
