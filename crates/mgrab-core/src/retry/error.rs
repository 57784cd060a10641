//! Per-connection error type used for retry classification.

use std::fmt;

/// Error from a single HTTP transfer (range GET, whole-segment GET, probe).
/// Kept as a concrete enum so the retry layer can classify it before the
/// caller converts it into a stage-level `FetchError`.
#[derive(Debug)]
pub enum SegmentError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Transfer completed but fewer bytes arrived than the range length
    /// (e.g. server closed early). Retryable instead of silent corruption.
    PartialTransfer { expected: u64, received: u64 },
    /// Disk write failed (disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// Transfer was aborted because the batch was cancelled. Not retried.
    Aborted,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::Curl(e) => write!(f, "{}", e),
            SegmentError::Http(code) => write!(f, "HTTP {}", code),
            SegmentError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            SegmentError::Storage(e) => write!(f, "storage: {}", e),
            SegmentError::Aborted => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentError::Curl(e) => Some(e),
            SegmentError::Storage(e) => Some(e),
            SegmentError::Http(_) | SegmentError::PartialTransfer { .. } | SegmentError::Aborted => {
                None
            }
        }
    }
}

impl SegmentError {
    /// Map a raw curl error, folding callback-aborted transfers into `Aborted`.
    pub fn from_curl(e: curl::Error) -> Self {
        if e.is_aborted_by_callback() {
            SegmentError::Aborted
        } else {
            SegmentError::Curl(e)
        }
    }
}
