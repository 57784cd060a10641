//! Segment fetcher: acquires one artifact per resolved stream descriptor.
//!
//! Direct streams are probed and pulled as parallel byte ranges into a
//! preallocated file; segmented manifests are pulled segment-by-segment and
//! remuxed. Either way the destination path holds a complete artifact on
//! success and nothing on failure.

mod direct;
mod manifest;
mod playlist;
mod pool;
mod segment;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use manifest::{FfmpegRemux, Remux};
pub(crate) use segment::http_get_string;

use crate::config::MgrabConfig;
use crate::control::CancelToken;
use crate::error::FetchError;
use crate::probe::NetTimeouts;
use crate::resolver::{StreamDescriptor, StreamKind};
use crate::retry::RetryPolicy;

/// Transfer tuning shared by both download strategies.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Upper bound on simultaneous connections per artifact.
    pub max_connections: usize,
    pub timeouts: NetTimeouts,
    pub retry: RetryPolicy,
}

impl FetchOptions {
    pub fn from_config(cfg: &MgrabConfig) -> Self {
        Self {
            max_connections: cfg.max_connections,
            timeouts: cfg.timeouts(),
            retry: cfg.retry_policy(),
        }
    }
}

/// Fetcher seam: downloads the descriptor's stream to `dest`.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        descriptor: &StreamDescriptor,
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<(), FetchError>;
}

/// Default fetcher; dispatches on the descriptor's stream kind.
pub struct SegmentFetcher {
    opts: FetchOptions,
    remux: Arc<dyn Remux>,
}

impl SegmentFetcher {
    pub fn new(opts: FetchOptions) -> Self {
        Self {
            remux: Arc::new(FfmpegRemux::new(Duration::from_secs(3600))),
            opts,
        }
    }

    pub fn from_config(cfg: &MgrabConfig) -> Self {
        Self::new(FetchOptions::from_config(cfg))
    }

    /// Swap the remux implementation (tests use a plain byte splice).
    pub fn with_remux(mut self, remux: Arc<dyn Remux>) -> Self {
        self.remux = remux;
        self
    }
}

#[async_trait]
impl Fetch for SegmentFetcher {
    async fn fetch(
        &self,
        descriptor: &StreamDescriptor,
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<(), FetchError> {
        match descriptor.kind {
            StreamKind::Direct => {
                let url = descriptor.url.clone();
                let dest = dest.to_path_buf();
                let opts = self.opts.clone();
                let cancel = cancel.clone();
                tokio::task::spawn_blocking(move || {
                    direct::fetch_direct_blocking(&url, &dest, &opts, &cancel)
                })
                .await
                .map_err(|e| FetchError::Task(e.to_string()))?
            }
            StreamKind::SegmentedManifest => {
                manifest::fetch_manifest(
                    &descriptor.url,
                    dest,
                    &self.opts,
                    self.remux.as_ref(),
                    cancel,
                )
                .await
            }
        }
    }
}
