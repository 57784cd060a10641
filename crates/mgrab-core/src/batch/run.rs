//! The batch driver: sequences resolve, fetch, post-process, and upload per
//! job, isolates per-job failures, and owns every temporary artifact.
//!
//! Jobs run strictly one at a time; parallelism lives inside the fetch
//! stage. The only batch-level failures are authorization denial and
//! workspace creation, everything else is recorded against its job.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::Authorizer;
use crate::control::CancelToken;
use crate::error::{BatchError, FetchError, StageError};
use crate::fetcher::Fetch;
use crate::postproc::PostProcess;
use crate::resolver::Resolve;
use crate::sink::{ProgressFn, TransferSink};

use super::{
    BatchRequest, BatchResult, DownloadJob, EventSink, FailedJob, JobStatus, NullEvents,
    ProgressEvent, Stage,
};

/// Wired pipeline: one implementation per stage seam plus the batch-level
/// collaborators. Construction picks defaults (allow-all authorization,
/// silent events, system temp dir) that `with_*` methods override.
pub struct Pipeline {
    resolver: Arc<dyn Resolve>,
    fetcher: Arc<dyn Fetch>,
    post: Arc<dyn PostProcess>,
    sink: Arc<dyn TransferSink>,
    authorizer: Arc<dyn Authorizer>,
    events: Arc<dyn EventSink>,
    work_root: PathBuf,
}

impl Pipeline {
    pub fn new(
        resolver: Arc<dyn Resolve>,
        fetcher: Arc<dyn Fetch>,
        post: Arc<dyn PostProcess>,
        sink: Arc<dyn TransferSink>,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            post,
            sink,
            authorizer: Arc::new(crate::auth::AllowAll),
            events: Arc::new(NullEvents),
            work_root: std::env::temp_dir(),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_work_root(mut self, root: PathBuf) -> Self {
        self.work_root = root;
        self
    }

    /// Runs every job in the request to a terminal state and returns the
    /// batch summary. Only authorization denial and workspace-creation
    /// failure abort the batch itself.
    pub async fn run_batch(
        &self,
        request: &BatchRequest,
        cancel: &CancelToken,
    ) -> Result<BatchResult, BatchError> {
        if !self.authorizer.is_authorized(&request.owner) {
            return Err(BatchError::Unauthorized(request.owner.clone()));
        }

        let batch_dir = self
            .work_root
            .join(format!("batch_{}", sanitize_name(&request.batch_name)));
        fs::create_dir_all(&batch_dir).map_err(BatchError::Workspace)?;

        let total = request.references.len();
        tracing::info!(batch = %request.batch_name, total, "batch started");

        let mut succeeded = 0usize;
        let mut failed: Vec<FailedJob> = Vec::new();

        for (index, reference) in request.references.iter().enumerate() {
            let mut job = DownloadJob::new(index, reference.clone());

            // Once cancelled, remaining jobs are marked without executing.
            if cancel.is_cancelled() {
                let reason = "Cancelled".to_string();
                job.status = JobStatus::Failed(reason.clone());
                self.events.job_failed(index, total, &reason);
                failed.push(FailedJob {
                    reference: reference.clone(),
                    reason,
                });
                continue;
            }

            let job_dir = batch_dir.join(format!("job_{:03}", index));
            let outcome = match fs::create_dir_all(&job_dir) {
                Ok(()) => self.run_job(&mut job, total, &job_dir, request, cancel).await,
                Err(e) => Err(StageError::Fetch(FetchError::Storage(e))),
            };

            match outcome {
                Ok(()) => {
                    job.status = JobStatus::Done;
                    succeeded += 1;
                    self.events.job_done(index, total);
                    tracing::info!(job = index, "job done");
                }
                Err(e) => {
                    let reason = e.reason();
                    tracing::warn!(job = index, reference = %reference, %reason, "job failed");
                    job.status = JobStatus::Failed(reason.clone());
                    self.events.job_failed(index, total, &reason);
                    failed.push(FailedJob {
                        reference: reference.clone(),
                        reason,
                    });
                }
            }

            remove_dir(&job_dir);
        }

        remove_dir(&batch_dir);
        tracing::info!(batch = %request.batch_name, succeeded, failed = failed.len(), "batch finished");
        Ok(BatchResult {
            total,
            succeeded,
            failed,
        })
    }

    async fn run_job(
        &self,
        job: &mut DownloadJob,
        total: usize,
        job_dir: &Path,
        request: &BatchRequest,
        cancel: &CancelToken,
    ) -> Result<(), StageError> {
        let index = job.index;

        job.status = JobStatus::Resolving;
        self.events.status(index, total, Stage::Resolving);
        let descriptor = self.resolver.resolve(&job.reference, cancel).await?;
        tracing::debug!(job = index, kind = ?descriptor.kind, url = %descriptor.url, "resolved");
        job.descriptor = Some(descriptor.clone());

        let file_name = format!(
            "{}_{:03}.mp4",
            sanitize_name(&request.batch_name),
            index + 1
        );
        let raw = job_dir.join(&file_name);

        job.status = JobStatus::Fetching;
        self.events.status(index, total, Stage::Fetching);
        self.fetcher.fetch(&descriptor, &raw, cancel).await?;
        job.local_path = Some(raw.clone());

        job.status = JobStatus::PostProcessing;
        self.events.status(index, total, Stage::PostProcessing);
        let compressed = job_dir.join(format!("{}.compressed.mp4", file_name));
        let upload_path = if self.post.process(&raw, &compressed, cancel).await? {
            job.local_path = Some(compressed.clone());
            compressed
        } else {
            raw
        };

        job.status = JobStatus::Uploading;
        self.events.status(index, total, Stage::Uploading);
        let caption = format!(
            "File: {}\nResolution: {}\nBatch: {}",
            file_name, request.resolution, request.batch_name
        );
        let events = Arc::clone(&self.events);
        let progress: ProgressFn = Box::new(move |current, total_bytes| {
            events.progress(&ProgressEvent {
                job_index: index,
                stage: Stage::Uploading,
                current,
                total: total_bytes,
            });
        });
        let ack = self
            .sink
            .upload(&upload_path, &caption, progress, cancel)
            .await?;
        tracing::debug!(job = index, bytes = ack.bytes_sent, "upload acknowledged");
        Ok(())
    }
}

fn remove_dir(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %dir.display(), error = %e, "failed to remove working directory");
        }
    }
}

/// Keeps names filesystem-safe: alphanumerics, `-` and `_` pass through,
/// everything else becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    let out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        "batch".to_string()
    } else {
        out
    }
}
