//! Batch orchestration: data model, event seam, and the job driver.

mod events;
mod run;

pub use events::{EventSink, NullEvents};
pub use run::Pipeline;

use std::fmt;
use std::path::PathBuf;

use crate::resolver::StreamDescriptor;

/// One batch of work, handed over as a single immutable unit.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub batch_name: String,
    /// Resolution label carried into upload captions (e.g. "720").
    pub resolution: String,
    /// Raw references, one job each, processed in this order.
    pub references: Vec<String>,
    /// Opaque owner identifier checked once against the authorizer.
    pub owner: String,
}

/// Pipeline stage a job is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Fetching,
    PostProcessing,
    Uploading,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Resolving => "resolving",
            Stage::Fetching => "fetching",
            Stage::PostProcessing => "post-processing",
            Stage::Uploading => "uploading",
        };
        f.write_str(s)
    }
}

/// Job lifecycle. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Resolving,
    Fetching,
    PostProcessing,
    Uploading,
    Done,
    Failed(String),
}

/// Per-reference unit of work. Owned exclusively by the orchestrator.
#[derive(Debug)]
pub struct DownloadJob {
    pub index: usize,
    pub reference: String,
    pub descriptor: Option<StreamDescriptor>,
    pub local_path: Option<PathBuf>,
    pub status: JobStatus,
}

impl DownloadJob {
    pub fn new(index: usize, reference: String) -> Self {
        Self {
            index,
            reference,
            descriptor: None,
            local_path: None,
            status: JobStatus::Pending,
        }
    }
}

/// One failed job in a batch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJob {
    pub reference: String,
    /// Short reason, prefixed with the error class name.
    pub reason: String,
}

/// Final batch summary. `succeeded + failed.len() == total` always holds.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedJob>,
}

/// Fire-and-forget progress notification. Never stored by the core.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub job_index: usize,
    pub stage: Stage,
    pub current: u64,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Resolving.to_string(), "resolving");
        assert_eq!(Stage::PostProcessing.to_string(), "post-processing");
    }

    #[test]
    fn new_job_is_pending() {
        let j = DownloadJob::new(3, "https://example.com/a.mp4".to_string());
        assert_eq!(j.status, JobStatus::Pending);
        assert!(j.descriptor.is_none());
        assert!(j.local_path.is_none());
    }
}
