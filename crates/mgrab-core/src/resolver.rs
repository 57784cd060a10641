//! Link resolution: raw references to fetchable stream descriptors.
//!
//! Most references are directly fetchable; a small table of indirect sources
//! names hosts whose pages embed the real stream URL. For those, one
//! secondary fetch pulls the landing page and the embedded URL is extracted
//! textually: the first `http(s)` URL containing the source's stream marker,
//! terminated by a quote character.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::{IndirectSourceConfig, MgrabConfig};
use crate::control::CancelToken;
use crate::error::ResolutionError;
use crate::fetcher::http_get_string;
use crate::probe::NetTimeouts;
use crate::retry::SegmentError;

/// Download strategy for a resolved stream. Fully determines how the fetcher
/// acquires the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// One flat file, fetched with parallel byte ranges.
    Direct,
    /// A playlist of media segments, fetched in parallel and remuxed.
    SegmentedManifest,
}

/// Resolved fetch target. Immutable once produced.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub kind: StreamKind,
    pub url: String,
}

/// Resolver seam: turns a raw reference into a stream descriptor.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(
        &self,
        reference: &str,
        cancel: &CancelToken,
    ) -> Result<StreamDescriptor, ResolutionError>;
}

/// One indirect-source rule, matched against the reference host in order.
#[derive(Debug, Clone)]
pub struct IndirectSource {
    /// Substring matched against the reference URL's host.
    pub host_fragment: String,
    /// Marker identifying the embedded stream URL in the landing page.
    pub stream_marker: String,
}

impl From<&IndirectSourceConfig> for IndirectSource {
    fn from(cfg: &IndirectSourceConfig) -> Self {
        Self {
            host_fragment: cfg.host.clone(),
            stream_marker: cfg.marker.clone(),
        }
    }
}

/// Default resolver implementation backed by the config's indirect table.
pub struct LinkResolver {
    sources: Vec<IndirectSource>,
    timeouts: NetTimeouts,
}

impl LinkResolver {
    pub fn new(sources: Vec<IndirectSource>, timeouts: NetTimeouts) -> Self {
        Self { sources, timeouts }
    }

    pub fn from_config(cfg: &MgrabConfig) -> Self {
        Self::new(
            cfg.resolver.indirect.iter().map(IndirectSource::from).collect(),
            resolver_timeouts(cfg.timeouts()),
        )
    }

    fn indirect_source_for(&self, url: &Url) -> Option<&IndirectSource> {
        let host = url.host_str()?;
        self.sources
            .iter()
            .find(|s| host.contains(s.host_fragment.as_str()))
    }
}

#[async_trait]
impl Resolve for LinkResolver {
    async fn resolve(
        &self,
        reference: &str,
        cancel: &CancelToken,
    ) -> Result<StreamDescriptor, ResolutionError> {
        if cancel.is_cancelled() {
            return Err(ResolutionError::Cancelled);
        }

        let url = Url::parse(reference)
            .map_err(|_| ResolutionError::InvalidReference(reference.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ResolutionError::InvalidReference(reference.to_string()));
        }

        if let Some(source) = self.indirect_source_for(&url) {
            tracing::debug!(host = ?url.host_str(), "indirect source, fetching landing page");
            let marker = source.stream_marker.clone();
            let page_url = url.to_string();
            let timeouts = self.timeouts;
            let cancel = cancel.clone();
            let body = tokio::task::spawn_blocking(move || {
                http_get_string(&page_url, &timeouts, &cancel)
            })
            .await
            .map_err(|e| ResolutionError::Network(e.to_string()))?
            .map_err(|e| match e {
                SegmentError::Aborted => ResolutionError::Cancelled,
                other => ResolutionError::Network(other.to_string()),
            })?;

            let embedded = extract_embedded_url(&body, &marker)
                .ok_or(ResolutionError::PatternNotFound)?;
            return Ok(StreamDescriptor {
                kind: kind_for_url(&embedded),
                url: embedded,
            });
        }

        Ok(StreamDescriptor {
            kind: kind_for_url(url.as_str()),
            url: url.to_string(),
        })
    }
}

/// `SegmentedManifest` when the URL path names a playlist file, else `Direct`.
fn kind_for_url(raw: &str) -> StreamKind {
    let path_is_manifest = Url::parse(raw)
        .map(|u| u.path().ends_with(".m3u8"))
        .unwrap_or_else(|_| raw.contains(".m3u8"));
    if path_is_manifest {
        StreamKind::SegmentedManifest
    } else {
        StreamKind::Direct
    }
}

/// Extracts the first `http(s)` URL containing `marker`, terminated by a
/// quote character, from a landing page body.
fn extract_embedded_url(body: &str, marker: &str) -> Option<String> {
    let marker_at = body.find(marker)?;
    let prefix = &body[..marker_at];
    let start = match (prefix.rfind("https://"), prefix.rfind("http://")) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let tail = &body[start..];
    let end = tail.find(['"', '\''])?;
    let candidate = &tail[..end];
    if candidate.contains(marker) {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// Resolver timeout guard: landing-page fetches should be snappy; cap the
/// transfer well under the download IO timeout.
pub fn resolver_timeouts(base: NetTimeouts) -> NetTimeouts {
    NetTimeouts {
        connect: base.connect,
        io: base.io.min(Duration::from_secs(30)),
    }
}
