//! HTTP metadata probing.
//!
//! Confirms `Content-Length` and `Accept-Ranges: bytes` before a direct
//! download is partitioned into parallel ranges. Some servers block HEAD, so
//! a one-byte ranged GET is used as a fallback probe.

use std::cell::Cell;
use std::str;
use std::time::Duration;

use crate::control::CancelToken;
use crate::retry::SegmentError;

/// Network timeouts shared by every curl transfer in the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct NetTimeouts {
    /// TCP connect timeout.
    pub connect: Duration,
    /// Whole-transfer / stall timeout.
    pub io: Duration,
}

impl Default for NetTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            io: Duration::from_secs(300),
        }
    }
}

/// Result of a metadata probe: the headers needed to plan a segmented fetch.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Total size in bytes, if the server reported one.
    pub content_length: Option<u64>,
    /// True if the server accepts byte-range requests.
    pub accept_ranges: bool,
}

/// Performs a HEAD request and returns parsed metadata. Follows redirects.
/// Runs in the current thread; call from `spawn_blocking` in async code.
pub fn probe(url: &str, timeouts: &NetTimeouts, cancel: &CancelToken) -> Result<ProbeResult, SegmentError> {
    let mut header_lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(SegmentError::Curl)?;
    easy.nobody(true).map_err(SegmentError::Curl)?; // HEAD request
    configure(&mut easy, timeouts)?;

    {
        let cancel = cancel.clone();
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    header_lines.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(SegmentError::Curl)?;
        transfer
            .progress_function(move |_, _, _, _| !cancel.is_cancelled())
            .map_err(SegmentError::Curl)?;
        transfer.perform().map_err(SegmentError::from_curl)?;
    }

    let code = easy.response_code().map_err(SegmentError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(SegmentError::Http(code));
    }

    Ok(parse_headers(&header_lines))
}

/// Probe that tolerates HEAD-blocking servers: if HEAD fails or reports no
/// size, fall back to a one-byte ranged GET and read `Content-Range`.
pub fn probe_with_fallback(
    url: &str,
    timeouts: &NetTimeouts,
    cancel: &CancelToken,
) -> Result<ProbeResult, SegmentError> {
    match probe(url, timeouts, cancel) {
        Ok(head) if head.content_length.is_some() => Ok(head),
        Ok(head) => match range_probe(url, timeouts, cancel) {
            Ok(ranged) => Ok(ranged),
            Err(_) => Ok(head),
        },
        Err(SegmentError::Aborted) => Err(SegmentError::Aborted),
        Err(head_err) => match range_probe(url, timeouts, cancel) {
            Ok(ranged) => Ok(ranged),
            Err(SegmentError::Aborted) => Err(SegmentError::Aborted),
            Err(_) => Err(head_err),
        },
    }
}

/// GET with `Range: bytes=0-0`. A 206 confirms range support and carries the
/// total size in `Content-Range`; a 200 means ranges are ignored, in which
/// case the transfer is aborted after the headers arrive.
fn range_probe(
    url: &str,
    timeouts: &NetTimeouts,
    cancel: &CancelToken,
) -> Result<ProbeResult, SegmentError> {
    let mut header_lines: Vec<String> = Vec::new();
    let headers_done = Cell::new(false);

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(SegmentError::Curl)?;
    easy.range("0-0").map_err(SegmentError::Curl)?;
    configure(&mut easy, timeouts)?;

    {
        let cancel = cancel.clone();
        let headers_done = &headers_done;
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    header_lines.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(SegmentError::Curl)?;
        // Body bytes mean the headers are complete; stop the transfer by
        // reporting a short write (servers ignoring Range would otherwise
        // stream the whole file here).
        transfer
            .write_function(move |_data| {
                headers_done.set(true);
                Ok(0)
            })
            .map_err(SegmentError::Curl)?;
        transfer
            .progress_function(move |_, _, _, _| !cancel.is_cancelled())
            .map_err(SegmentError::Curl)?;
        match transfer.perform() {
            Ok(()) => {}
            // A deliberate short write after the headers is how we stop a
            // 200 full-body response; anything else is a real failure.
            Err(e) if e.is_write_error() && headers_done.get() => {}
            Err(e) => return Err(SegmentError::from_curl(e)),
        }
    }

    let code = easy.response_code().map_err(SegmentError::Curl)?;
    match code {
        206 => {
            let total = header_lines.iter().find_map(|l| parse_content_range_total(l));
            Ok(ProbeResult {
                content_length: total,
                accept_ranges: true,
            })
        }
        200 => {
            let parsed = parse_headers(&header_lines);
            Ok(ProbeResult {
                content_length: parsed.content_length,
                accept_ranges: false,
            })
        }
        other => Err(SegmentError::Http(other)),
    }
}

fn configure(easy: &mut curl::easy::Easy, timeouts: &NetTimeouts) -> Result<(), SegmentError> {
    easy.follow_location(true).map_err(SegmentError::Curl)?;
    easy.connect_timeout(timeouts.connect).map_err(SegmentError::Curl)?;
    easy.timeout(timeouts.io).map_err(SegmentError::Curl)?;
    easy.progress(true).map_err(SegmentError::Curl)?;
    Ok(())
}

/// Parse collected header lines into a ProbeResult.
fn parse_headers(lines: &[String]) -> ProbeResult {
    let mut content_length = None;
    let mut accept_ranges = false;

    for line in lines {
        let line = line.trim();
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    content_length = Some(n);
                }
            }
            if name.eq_ignore_ascii_case("accept-ranges") {
                accept_ranges = value.eq_ignore_ascii_case("bytes");
            }
        }
    }

    ProbeResult {
        content_length,
        accept_ranges,
    }
}

/// Total size from a `Content-Range: bytes 0-0/12345` header line, if this
/// line is one and the total is known.
fn parse_content_range_total(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-range") {
        return None;
    }
    let value = value.trim();
    let rest = value.strip_prefix("bytes")?.trim();
    let (_, total) = rest.rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}
