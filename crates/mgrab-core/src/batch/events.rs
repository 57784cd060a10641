//! Event-emission seam between the orchestrator and whatever reports to the
//! operator (console, chat transport, log sink). All methods default to
//! no-ops so implementations pick what they care about.

use super::{ProgressEvent, Stage};

pub trait EventSink: Send + Sync {
    /// A job entered a new stage. `total` is the batch's job count.
    fn status(&self, job_index: usize, total: usize, stage: Stage) {
        let _ = (job_index, total, stage);
    }

    /// Byte-level progress within a stage, at most one call per chunk.
    fn progress(&self, event: &ProgressEvent) {
        let _ = event;
    }

    /// A job reached `Done`.
    fn job_done(&self, job_index: usize, total: usize) {
        let _ = (job_index, total);
    }

    /// A job reached `Failed(reason)`.
    fn job_failed(&self, job_index: usize, total: usize, reason: &str) {
        let _ = (job_index, total, reason);
    }
}

/// Discards everything.
pub struct NullEvents;

impl EventSink for NullEvents {}
