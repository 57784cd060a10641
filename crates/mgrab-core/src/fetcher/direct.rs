//! Direct (flat-file) download: probe, partition into byte ranges, fetch
//! ranges in parallel, finalize atomically.
//!
//! Servers without range support (or without a known size) fall back to a
//! single-stream GET. On any failure the `.part` temp file is deleted so a
//! partially-written file is never mistaken for a finished artifact.

use std::path::Path;

use crate::control::CancelToken;
use crate::error::FetchError;
use crate::probe;
use crate::retry::{run_with_retry, SegmentError};
use crate::segmenter::{plan_segments, Segment};
use crate::storage::{self, ArtifactWriter, ArtifactWriterBuilder};

use super::pool::run_pool;
use super::segment::{download_range, download_whole};
use super::FetchOptions;

pub(crate) fn fetch_direct_blocking(
    url: &str,
    dest: &Path,
    opts: &FetchOptions,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    let head = probe::probe_with_fallback(url, &opts.timeouts, cancel).map_err(|e| match e {
        SegmentError::Aborted => FetchError::Cancelled,
        other => FetchError::Probe(other.to_string()),
    })?;

    let tmp = storage::temp_path(dest);
    let result = match head.content_length {
        Some(size) if size > 0 && head.accept_ranges => {
            fetch_ranged(url, dest, &tmp, size, opts, cancel)
        }
        _ => {
            tracing::debug!(url, "no usable range support, single-stream fetch");
            fetch_single(url, dest, &tmp, opts, cancel)
        }
    };

    if result.is_err() && tmp.exists() {
        if let Err(e) = std::fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), error = %e, "failed to remove partial file");
        }
    }
    result
}

fn fetch_ranged(
    url: &str,
    dest: &Path,
    tmp: &Path,
    size: u64,
    opts: &FetchOptions,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    let connections = opts
        .max_connections
        .max(1)
        .min(usize::try_from(size).unwrap_or(usize::MAX));
    let segments = plan_segments(size, connections);
    let work: Vec<(usize, Segment)> = segments.into_iter().enumerate().collect();
    let total = work.len();

    let mut builder = ArtifactWriterBuilder::create(tmp)?;
    builder.preallocate(size)?;
    let writer = builder.build();

    tracing::debug!(url, size, connections = total, "starting ranged fetch");

    let results = {
        let url = url.to_string();
        let writer: ArtifactWriter = writer.clone();
        let timeouts = opts.timeouts;
        let policy = opts.retry;
        let worker_cancel = cancel.clone();
        run_pool(work, connections, cancel, move |_, segment| {
            run_with_retry(&policy, &worker_cancel, || {
                download_range(&url, segment, &writer, &timeouts, &worker_cancel)
            })
        })
    };

    if let Some((index, err)) = results
        .into_iter()
        .filter_map(|(i, r)| r.err().map(|e| (i, e)))
        .next()
    {
        let _ = writer.discard();
        return Err(match err {
            SegmentError::Aborted => FetchError::Cancelled,
            source => FetchError::Segment { index, source },
        });
    }
    if cancel.is_cancelled() {
        let _ = writer.discard();
        return Err(FetchError::Cancelled);
    }

    writer.sync()?;
    writer.finalize(dest)?;
    Ok(())
}

fn fetch_single(
    url: &str,
    dest: &Path,
    tmp: &Path,
    opts: &FetchOptions,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    let res = run_with_retry(&opts.retry, cancel, || {
        download_whole(url, tmp, &opts.timeouts, cancel)
    });
    match res {
        Ok(()) => {
            std::fs::rename(tmp, dest)?;
            Ok(())
        }
        Err(SegmentError::Aborted) => Err(FetchError::Cancelled),
        Err(source) => Err(FetchError::Segment { index: 0, source }),
    }
}
