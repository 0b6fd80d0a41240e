//! Work items and batch results.

use crate::error::MigrateError;

/// Result of processing one item.
#[derive(Debug)]
pub enum StepOutcome<O> {
    /// The item was translated and registered.
    Completed(O),
    /// A dependency is not registered yet; retry the item later.
    Deferred { waiting_on: String },
}

/// An item in the worklist.
#[derive(Debug)]
pub struct PendingWorkItem<I> {
    pub item: I,
    /// Display name used in logs and anomalies.
    pub label: String,
    /// Times the item went back to the end of the worklist.
    pub requeues: u32,
    /// Reference the item last waited on.
    pub waiting_on: Option<String>,
}

impl<I> PendingWorkItem<I> {
    pub fn new(item: I, label: String) -> Self {
        Self {
            item,
            label,
            requeues: 0,
            waiting_on: None,
        }
    }
}

/// Outcome of a whole batch.
#[derive(Debug)]
pub struct EngineReport<I, O> {
    /// Items popped from the worklist.
    pub iterations: usize,
    /// Total requeues across all items.
    pub requeues: usize,
    /// Outputs in completion order.
    pub completed: Vec<O>,
    /// Items dropped because their step failed.
    pub failed: Vec<(String, MigrateError)>,
    /// Items still waiting when the ceiling was hit.
    pub unresolved: Vec<PendingWorkItem<I>>,
    pub ceiling_exceeded: bool,
}

impl<I, O> EngineReport<I, O> {
    pub(super) fn new() -> Self {
        Self {
            iterations: 0,
            requeues: 0,
            completed: Vec::new(),
            failed: Vec::new(),
            unresolved: Vec::new(),
            ceiling_exceeded: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.unresolved.is_empty()
    }
}
