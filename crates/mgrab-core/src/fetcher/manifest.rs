//! Segmented-manifest download: fetch the playlist, pull every segment in
//! parallel into a scratch directory, then concatenate them into the final
//! artifact in playlist order.
//!
//! Concatenation goes through the `Remux` seam so tests can splice segments
//! without an ffmpeg binary. The scratch directory lives next to the
//! destination and is removed whatever the outcome.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::control::CancelToken;
use crate::error::FetchError;
use crate::retry::{run_with_retry, SegmentError};
use crate::tool::{run_tool, ToolError};

use super::playlist::parse_segment_urls;
use super::pool::run_pool;
use super::segment::{download_whole, http_get_string};
use super::FetchOptions;

/// Joins downloaded segments into one artifact at `dest`, in the order given.
#[async_trait]
pub trait Remux: Send + Sync {
    async fn concat(
        &self,
        dir: &Path,
        parts: &[PathBuf],
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ToolError>;
}

/// Stream-copy concatenation via ffmpeg's concat demuxer. No re-encode;
/// container timestamps come straight from the segments.
pub struct FfmpegRemux {
    pub ceiling: Duration,
}

impl FfmpegRemux {
    pub fn new(ceiling: Duration) -> Self {
        Self { ceiling }
    }
}

#[async_trait]
impl Remux for FfmpegRemux {
    async fn concat(
        &self,
        dir: &Path,
        parts: &[PathBuf],
        dest: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ToolError> {
        let list_path = dir.join("concat.txt");
        let mut list = String::new();
        for part in parts {
            // concat demuxer input lines; segment names are ours and never
            // contain quotes.
            list.push_str(&format!("file '{}'\n", part.display()));
        }
        fs::write(&list_path, list).map_err(|source| ToolError::Io {
            tool: "ffmpeg".to_string(),
            source,
        })?;

        let args: Vec<OsString> = [
            OsString::from("-f"),
            OsString::from("concat"),
            OsString::from("-safe"),
            OsString::from("0"),
            OsString::from("-i"),
            list_path.clone().into_os_string(),
            OsString::from("-c"),
            OsString::from("copy"),
            OsString::from("-y"),
            dest.to_path_buf().into_os_string(),
        ]
        .into();
        run_tool("ffmpeg", &args, self.ceiling, cancel).await
    }
}

/// Scratch directory that is removed on drop, so segment files never outlive
/// the fetch whatever path it exits through.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(path: PathBuf) -> Result<Self, FetchError> {
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove scratch dir");
            }
        }
    }
}

fn segment_file_name(index: usize) -> String {
    format!("seg_{:05}.ts", index)
}

fn scratch_dir_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    dest.with_file_name(format!("{}.segments", name))
}

/// Fetches a segmented manifest: playlist, then all segments, then remux.
pub(crate) async fn fetch_manifest(
    manifest_url: &str,
    dest: &Path,
    opts: &FetchOptions,
    remux: &dyn Remux,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    let base = Url::parse(manifest_url)
        .map_err(|e| FetchError::Manifest(format!("bad manifest URL: {}", e)))?;

    let body = {
        let url = manifest_url.to_string();
        let timeouts = opts.timeouts;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || http_get_string(&url, &timeouts, &cancel))
            .await
            .map_err(|e| FetchError::Task(e.to_string()))?
            .map_err(|e| match e {
                SegmentError::Aborted => FetchError::Cancelled,
                other => FetchError::Manifest(other.to_string()),
            })?
    };

    let urls = parse_segment_urls(&body, &base)?;
    if urls.is_empty() {
        return Err(FetchError::EmptyManifest);
    }
    tracing::debug!(url = manifest_url, segments = urls.len(), "manifest parsed");

    let scratch = ScratchDir::create(scratch_dir_path(dest))?;
    let parts: Vec<PathBuf> = (0..urls.len())
        .map(|i| scratch.path.join(segment_file_name(i)))
        .collect();

    let results = {
        let work: Vec<(usize, (String, PathBuf))> = urls
            .into_iter()
            .zip(parts.iter().cloned())
            .enumerate()
            .map(|(i, pair)| (i, pair))
            .collect();
        let workers = opts.max_connections.max(1);
        let timeouts = opts.timeouts;
        let policy = opts.retry;
        let pool_cancel = cancel.clone();
        let worker_cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            run_pool(work, workers, &pool_cancel, move |_, (url, path)| {
                run_with_retry(&policy, &worker_cancel, || {
                    download_whole(url, path, &timeouts, &worker_cancel)
                })
            })
        })
        .await
        .map_err(|e| FetchError::Task(e.to_string()))?
    };

    if let Some((index, err)) = results
        .into_iter()
        .filter_map(|(i, r)| r.err().map(|e| (i, e)))
        .next()
    {
        return Err(match err {
            SegmentError::Aborted => FetchError::Cancelled,
            source => FetchError::Segment { index, source },
        });
    }
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    if let Err(e) = remux.concat(&scratch.path, &parts, dest, cancel).await {
        // A half-written concat output is not a valid artifact.
        if dest.exists() {
            let _ = fs::remove_file(dest);
        }
        return Err(match e {
            ToolError::Cancelled => FetchError::Cancelled,
            other => FetchError::Remux(other),
        });
    }
    Ok(())
}
