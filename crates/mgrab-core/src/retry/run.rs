//! Retry loop: run a transfer until success, exhaustion, or cancellation.

use std::time::Duration;

use super::classify::classify;
use super::error::SegmentError;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::CancelToken;

/// Longest uninterruptible sleep slice; keeps cancellation grace bounded
/// even when the backoff delay is large.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Runs a closure until it succeeds or the retry policy says to stop.
/// On retryable failure, sleeps for the backoff duration then tries again.
/// Cancellation short-circuits both the next attempt and any backoff sleep.
pub fn run_with_retry<F>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut f: F,
) -> Result<(), SegmentError>
where
    F: FnMut() -> Result<(), SegmentError>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(SegmentError::Aborted);
        }
        match f() {
            Ok(()) => return Ok(()),
            Err(SegmentError::Aborted) => return Err(SegmentError::Aborted),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(delay) => {
                        sleep_cancellable(delay, cancel);
                        attempt += 1;
                    }
                }
            }
        }
    }
}

fn sleep_cancellable(total: Duration, cancel: &CancelToken) {
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return;
        }
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
