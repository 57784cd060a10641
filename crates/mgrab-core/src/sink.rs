//! Transfer sink: streams the finished artifact to its destination.
//!
//! The HTTP sink uploads with a chunked read callback so memory stays flat
//! regardless of artifact size, and reports progress once per chunk. The
//! caption travels out-of-band in a request header.

use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use curl::easy::{Easy, List, ReadError};

use crate::config::MgrabConfig;
use crate::control::CancelToken;
use crate::error::TransferError;
use crate::probe::NetTimeouts;

/// Header carrying the artifact caption alongside the upload body.
pub const CAPTION_HEADER: &str = "X-Mgrab-Caption";

/// Destination acknowledgement for a completed upload.
#[derive(Debug, Clone)]
pub struct SinkAck {
    pub bytes_sent: u64,
}

/// Progress callback: `(bytes_sent, total_bytes)`, invoked once per chunk
/// and once at completion.
pub type ProgressFn = Box<dyn FnMut(u64, u64) + Send>;

/// Sink seam: delivers one artifact plus its caption.
#[async_trait]
pub trait TransferSink: Send + Sync {
    async fn upload(
        &self,
        artifact: &Path,
        caption: &str,
        progress: ProgressFn,
        cancel: &CancelToken,
    ) -> Result<SinkAck, TransferError>;
}

/// Chunked streaming upload over HTTP PUT.
pub struct HttpSink {
    endpoint: String,
    chunk_bytes: usize,
    timeouts: NetTimeouts,
}

impl HttpSink {
    pub fn new(endpoint: String, chunk_bytes: usize, timeouts: NetTimeouts) -> Self {
        Self {
            endpoint,
            chunk_bytes: chunk_bytes.max(1),
            timeouts,
        }
    }

    pub fn from_config(endpoint: String, cfg: &MgrabConfig) -> Self {
        Self::new(endpoint, cfg.upload_chunk_bytes, cfg.timeouts())
    }
}

#[async_trait]
impl TransferSink for HttpSink {
    async fn upload(
        &self,
        artifact: &Path,
        caption: &str,
        progress: ProgressFn,
        cancel: &CancelToken,
    ) -> Result<SinkAck, TransferError> {
        let endpoint = self.endpoint.clone();
        let chunk_bytes = self.chunk_bytes;
        let timeouts = self.timeouts;
        let artifact = artifact.to_path_buf();
        let caption = caption.to_string();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            upload_blocking(
                &endpoint,
                &artifact,
                &caption,
                chunk_bytes,
                &timeouts,
                progress,
                &cancel,
            )
        })
        .await
        .map_err(|e| TransferError::Network(e.to_string()))?
    }
}

fn upload_blocking(
    endpoint: &str,
    artifact: &Path,
    caption: &str,
    chunk_bytes: usize,
    timeouts: &NetTimeouts,
    mut progress: ProgressFn,
    cancel: &CancelToken,
) -> Result<SinkAck, TransferError> {
    let total = std::fs::metadata(artifact)?.len();
    let file = File::open(artifact)?;
    tracing::debug!(endpoint, total, "starting upload");

    let mut easy = Easy::new();
    easy.url(endpoint).map_err(net)?;
    easy.upload(true).map_err(net)?;
    easy.in_filesize(total).map_err(net)?;
    easy.follow_location(true).map_err(net)?;
    easy.connect_timeout(timeouts.connect).map_err(net)?;
    easy.timeout(timeouts.io).map_err(net)?;

    let mut headers = List::new();
    headers
        .append(&format!("{}: {}", CAPTION_HEADER, sanitize_header_value(caption)))
        .map_err(net)?;
    easy.http_headers(headers).map_err(net)?;

    let sent = std::cell::Cell::new(0u64);
    let read_error: RefCell<Option<std::io::Error>> = RefCell::new(None);
    {
        let file = RefCell::new(file);
        let sent = &sent;
        let read_error = &read_error;
        let cancel_inner = cancel.clone();
        let progress = &mut progress;
        let mut transfer = easy.transfer();
        transfer
            .read_function(move |buf| {
                if cancel_inner.is_cancelled() {
                    return Err(ReadError::Abort);
                }
                let cap = buf.len().min(chunk_bytes);
                match file.borrow_mut().read(&mut buf[..cap]) {
                    Ok(n) => {
                        if n > 0 {
                            sent.set(sent.get() + n as u64);
                            progress(sent.get(), total);
                        }
                        Ok(n)
                    }
                    Err(e) => {
                        *read_error.borrow_mut() = Some(e);
                        Err(ReadError::Abort)
                    }
                }
            })
            .map_err(net)?;
        if let Err(e) = transfer.perform() {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            if let Some(io_err) = read_error.borrow_mut().take() {
                return Err(TransferError::Io(io_err));
            }
            return Err(TransferError::Network(e.to_string()));
        }
    }

    let code = easy.response_code().map_err(net)?;
    if !(200..300).contains(&code) {
        return Err(TransferError::Rejected(code));
    }
    Ok(SinkAck {
        bytes_sent: sent.get(),
    })
}

fn net(e: curl::Error) -> TransferError {
    TransferError::Network(e.to_string())
}

/// Header values must be a single line; captions carry newlines.
fn sanitize_header_value(caption: &str) -> String {
    caption
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_header_is_single_line() {
        let caption = "File: a.mp4\nResolution: 720\nBatch: b";
        let v = sanitize_header_value(caption);
        assert!(!v.contains('\n'));
        assert_eq!(v, "File: a.mp4 Resolution: 720 Batch: b");
    }

    #[test]
    fn chunk_size_floor_is_one() {
        let s = HttpSink::new("http://example/up".to_string(), 0, NetTimeouts::default());
        assert_eq!(s.chunk_bytes, 1);
    }
}
