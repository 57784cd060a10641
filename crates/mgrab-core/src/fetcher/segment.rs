//! Single-connection curl transfers: ranged GETs into an artifact writer,
//! whole-file GETs for manifest segments, and small text fetches.
//!
//! All functions here are blocking and run on worker threads or under
//! `spawn_blocking`. Cancellation is wired through curl's progress callback;
//! an aborted transfer surfaces as `SegmentError::Aborted`.

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::Path;

use crate::control::CancelToken;
use crate::probe::NetTimeouts;
use crate::retry::SegmentError;
use crate::segmenter::Segment;
use crate::storage::ArtifactWriter;

fn new_easy(url: &str, timeouts: &NetTimeouts) -> Result<curl::easy::Easy, SegmentError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(SegmentError::Curl)?;
    easy.follow_location(true).map_err(SegmentError::Curl)?;
    easy.connect_timeout(timeouts.connect).map_err(SegmentError::Curl)?;
    easy.timeout(timeouts.io).map_err(SegmentError::Curl)?;
    easy.progress(true).map_err(SegmentError::Curl)?;
    Ok(easy)
}

fn check_response(easy: &mut curl::easy::Easy) -> Result<(), SegmentError> {
    let code = easy.response_code().map_err(SegmentError::Curl)?;
    if (200..300).contains(&code) {
        Ok(())
    } else {
        Err(SegmentError::Http(code))
    }
}

/// Downloads one byte range and writes it at the segment's offset.
///
/// The body must be exactly `segment.len()` bytes; a short body is reported
/// as `PartialTransfer` so the retry layer can try again instead of leaving
/// a silent hole in the artifact.
pub(crate) fn download_range(
    url: &str,
    segment: &Segment,
    storage: &ArtifactWriter,
    timeouts: &NetTimeouts,
    cancel: &CancelToken,
) -> Result<(), SegmentError> {
    let bytes_written = Cell::new(0u64);
    let storage_error: RefCell<Option<std::io::Error>> = RefCell::new(None);
    let segment_start = segment.start;

    let mut easy = new_easy(url, timeouts)?;
    easy.range(&segment.curl_range_value()).map_err(SegmentError::Curl)?;

    {
        let storage = storage.clone();
        let cancel = cancel.clone();
        let bytes_written = &bytes_written;
        let storage_error = &storage_error;
        let mut transfer = easy.transfer();
        transfer
            .write_function(move |data| {
                let off = bytes_written.get();
                match storage.write_at(segment_start + off, data) {
                    Ok(()) => {
                        bytes_written.set(off + data.len() as u64);
                        Ok(data.len())
                    }
                    Err(e) => {
                        // Short write aborts the transfer; the real error is
                        // stashed and recovered below.
                        *storage_error.borrow_mut() = Some(e);
                        Ok(0)
                    }
                }
            })
            .map_err(SegmentError::Curl)?;
        transfer
            .progress_function(move |_, _, _, _| !cancel.is_cancelled())
            .map_err(SegmentError::Curl)?;
        if let Err(e) = transfer.perform() {
            if let Some(io_err) = storage_error.borrow_mut().take() {
                return Err(SegmentError::Storage(io_err));
            }
            return Err(SegmentError::from_curl(e));
        }
    }

    check_response(&mut easy)?;

    let received = bytes_written.get();
    let expected = segment.len();
    if received != expected {
        return Err(SegmentError::PartialTransfer { expected, received });
    }
    Ok(())
}

/// Downloads a whole resource sequentially to `dest` (manifest segments,
/// single-stream fallback). Overwrites any existing file at `dest`.
pub(crate) fn download_whole(
    url: &str,
    dest: &Path,
    timeouts: &NetTimeouts,
    cancel: &CancelToken,
) -> Result<(), SegmentError> {
    let file = std::fs::File::create(dest).map_err(SegmentError::Storage)?;
    let file = RefCell::new(file);
    let storage_error: RefCell<Option<std::io::Error>> = RefCell::new(None);

    let mut easy = new_easy(url, timeouts)?;

    {
        let cancel = cancel.clone();
        let file = &file;
        let storage_error = &storage_error;
        let mut transfer = easy.transfer();
        transfer
            .write_function(move |data| {
                match file.borrow_mut().write_all(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        *storage_error.borrow_mut() = Some(e);
                        Ok(0)
                    }
                }
            })
            .map_err(SegmentError::Curl)?;
        transfer
            .progress_function(move |_, _, _, _| !cancel.is_cancelled())
            .map_err(SegmentError::Curl)?;
        if let Err(e) = transfer.perform() {
            if let Some(io_err) = storage_error.borrow_mut().take() {
                return Err(SegmentError::Storage(io_err));
            }
            return Err(SegmentError::from_curl(e));
        }
    }

    check_response(&mut easy)?;
    file.into_inner().sync_all().map_err(SegmentError::Storage)
}

/// Fetches a small text resource (playlist, landing page) into memory.
pub(crate) fn http_get_string(
    url: &str,
    timeouts: &NetTimeouts,
    cancel: &CancelToken,
) -> Result<String, SegmentError> {
    let body: RefCell<Vec<u8>> = RefCell::new(Vec::new());

    let mut easy = new_easy(url, timeouts)?;

    {
        let cancel = cancel.clone();
        let body = &body;
        let mut transfer = easy.transfer();
        transfer
            .write_function(move |data| {
                body.borrow_mut().extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(SegmentError::Curl)?;
        transfer
            .progress_function(move |_, _, _, _| !cancel.is_cancelled())
            .map_err(SegmentError::Curl)?;
        transfer.perform().map_err(SegmentError::from_curl)?;
    }

    check_response(&mut easy)?;
    Ok(String::from_utf8_lossy(&body.into_inner()).into_owned())
}
