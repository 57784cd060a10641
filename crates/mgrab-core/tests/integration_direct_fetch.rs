//! Integration tests for direct (flat-file) fetches against a local
//! range-capable HTTP server: byte coverage, single-stream fallback, retry,
//! atomicity on failure, and cancellation.

mod common;

use std::time::Duration;

use common::media_server::{MediaServer, Route, ServerOptions};
use mgrab_core::control::CancelToken;
use mgrab_core::error::FetchError;
use mgrab_core::fetcher::{Fetch, FetchOptions, SegmentFetcher};
use mgrab_core::probe::NetTimeouts;
use mgrab_core::resolver::{StreamDescriptor, StreamKind};
use mgrab_core::retry::RetryPolicy;
use tempfile::tempdir;

fn test_opts(max_connections: usize) -> FetchOptions {
    FetchOptions {
        max_connections,
        timeouts: NetTimeouts {
            connect: Duration::from_secs(5),
            io: Duration::from_secs(30),
        },
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
    }
}

fn direct(url: String) -> StreamDescriptor {
    StreamDescriptor {
        kind: StreamKind::Direct,
        url,
    }
}

#[tokio::test]
async fn ranged_fetch_reproduces_exact_bytes() {
    let body: Vec<u8> = (0u8..251).cycle().take(96 * 1024 + 77).collect();
    let server = MediaServer::start();
    server.add_body("/clip.mp4", body.clone());

    let dir = tempdir().unwrap();
    let dest = dir.path().join("clip.mp4");
    let fetcher = SegmentFetcher::new(test_opts(8));
    fetcher
        .fetch(&direct(server.url("/clip.mp4")), &dest, &CancelToken::new())
        .await
        .unwrap();

    let got = std::fs::read(&dest).unwrap();
    assert_eq!(got.len(), body.len());
    assert_eq!(got, body);
    assert!(!dir.path().join("clip.mp4.part").exists());
}

#[tokio::test]
async fn server_without_ranges_falls_back_to_single_stream() {
    let body: Vec<u8> = (0u8..101).cycle().take(32 * 1024).collect();
    let server = MediaServer::start_with_options(ServerOptions {
        head_allowed: false,
        support_ranges: false,
    });
    server.add_body("/plain.bin", body.clone());

    let dir = tempdir().unwrap();
    let dest = dir.path().join("plain.bin");
    let fetcher = SegmentFetcher::new(test_opts(8));
    fetcher
        .fetch(&direct(server.url("/plain.bin")), &dest, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let body: Vec<u8> = vec![7u8; 16 * 1024];
    let server = MediaServer::start();
    server.add_route(
        "/flaky.bin",
        Route {
            body: body.clone(),
            status: 200,
            fail_first: 1,
            chunk_delay: None,
        },
    );

    let dir = tempdir().unwrap();
    let dest = dir.path().join("flaky.bin");
    // One connection so the injected failure hits the only worker.
    let fetcher = SegmentFetcher::new(test_opts(1));
    fetcher
        .fetch(&direct(server.url("/flaky.bin")), &dest, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn exhausted_retries_leave_no_artifact() {
    let server = MediaServer::start();
    server.add_route(
        "/broken.bin",
        Route {
            body: vec![1u8; 8 * 1024],
            status: 200,
            fail_first: 1000,
            chunk_delay: None,
        },
    );

    let dir = tempdir().unwrap();
    let dest = dir.path().join("broken.bin");
    let fetcher = SegmentFetcher::new(test_opts(4));
    let err = fetcher
        .fetch(&direct(server.url("/broken.bin")), &dest, &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Segment { .. }), "got {:?}", err);
    assert!(!dest.exists(), "no artifact at the final path");
    assert!(!dir.path().join("broken.bin.part").exists(), "no temp file");
}

#[tokio::test]
async fn missing_resource_fails_probe() {
    let server = MediaServer::start();
    let dir = tempdir().unwrap();
    let dest = dir.path().join("gone.bin");
    let fetcher = SegmentFetcher::new(test_opts(4));
    let err = fetcher
        .fetch(&direct(server.url("/gone.bin")), &dest, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, FetchError::Probe(_) | FetchError::Segment { .. }),
        "got {:?}",
        err
    );
    assert!(!dest.exists());
}

#[tokio::test]
async fn cancellation_mid_fetch_aborts_and_cleans_up() {
    let body: Vec<u8> = vec![9u8; 256 * 1024];
    let server = MediaServer::start();
    server.add_route(
        "/slow.bin",
        Route {
            body,
            status: 200,
            fail_first: 0,
            chunk_delay: Some(Duration::from_millis(20)),
        },
    );

    let dir = tempdir().unwrap();
    let dest = dir.path().join("slow.bin");
    let cancel = CancelToken::new();
    let killer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        killer.cancel();
    });

    let start = std::time::Instant::now();
    let fetcher = SegmentFetcher::new(test_opts(4));
    let err = fetcher
        .fetch(&direct(server.url("/slow.bin")), &dest, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Cancelled), "got {:?}", err);
    assert!(start.elapsed() < Duration::from_secs(10), "bounded grace");
    assert!(!dest.exists());
    assert!(!dir.path().join("slow.bin.part").exists());
}
