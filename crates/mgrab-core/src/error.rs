//! Stage-level error taxonomy.
//!
//! Each pipeline stage has its own error enum; the orchestrator catches any
//! of them at the job boundary as a `StageError`, records the reason against
//! the job, and moves on. Only `BatchError` conditions abort a whole batch.

use thiserror::Error;

use crate::retry::SegmentError;
use crate::tool::ToolError;

/// Resolver failures: the reference could not be turned into a fetchable
/// stream descriptor.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("reference is not a fetchable URL: {0}")]
    InvalidReference(String),
    #[error("no stream pattern found in landing page")]
    PatternNotFound,
    #[error("landing page fetch failed: {0}")]
    Network(String),
    #[error("cancelled")]
    Cancelled,
}

/// Segment fetcher failures. Any of these leaves no artifact at the
/// destination path.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("metadata probe failed: {0}")]
    Probe(String),
    #[error("segment {index} failed after retries: {source}")]
    Segment {
        index: usize,
        #[source]
        source: SegmentError,
    },
    #[error("manifest fetch failed: {0}")]
    Manifest(String),
    #[error("manifest lists no segments")]
    EmptyManifest,
    #[error("remux failed: {0}")]
    Remux(#[source] ToolError),
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),
    #[error("fetch worker failed: {0}")]
    Task(String),
    #[error("cancelled")]
    Cancelled,
}

/// Post-processor failures (encode subprocess).
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("encode failed: {0}")]
    Tool(#[source] ToolError),
    #[error("cancelled")]
    Cancelled,
}

impl From<ToolError> for EncodeError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::Cancelled => EncodeError::Cancelled,
            other => EncodeError::Tool(other),
        }
    }
}

/// Transfer sink failures.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("destination rejected upload: HTTP {0}")]
    Rejected(u32),
    #[error("transport failure: {0}")]
    Network(String),
    #[error("artifact read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("cancelled")]
    Cancelled,
}

/// Any stage error, caught at the job boundary by the orchestrator.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl StageError {
    /// True when the underlying cause is batch cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            StageError::Resolution(ResolutionError::Cancelled)
                | StageError::Fetch(FetchError::Cancelled)
                | StageError::Encode(EncodeError::Cancelled)
                | StageError::Transfer(TransferError::Cancelled)
        )
    }

    /// Error class name used as the failure-reason prefix in batch results.
    pub fn class_name(&self) -> &'static str {
        if self.is_cancelled() {
            return "Cancelled";
        }
        match self {
            StageError::Resolution(_) => "ResolutionError",
            StageError::Fetch(_) => "FetchError",
            StageError::Encode(_) => "EncodeError",
            StageError::Transfer(_) => "TransferError",
        }
    }

    /// Short human-readable reason recorded against a failed job.
    pub fn reason(&self) -> String {
        if self.is_cancelled() {
            "Cancelled".to_string()
        } else {
            format!("{}: {}", self.class_name(), self)
        }
    }
}

/// Conditions outside any single job that fail the batch as a whole.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("owner {0:?} is not authorized")]
    Unauthorized(String),
    #[error("failed to create batch workspace: {0}")]
    Workspace(#[source] std::io::Error),
}
