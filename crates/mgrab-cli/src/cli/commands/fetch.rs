//! `mgrab fetch` – single-item download without post-process or upload.

use std::path::PathBuf;

use anyhow::Result;
use mgrab_core::config::MgrabConfig;
use mgrab_core::control::CancelToken;
use mgrab_core::fetcher::{Fetch, SegmentFetcher};
use mgrab_core::resolver::{LinkResolver, Resolve};

pub async fn run_fetch(cfg: &MgrabConfig, reference: &str, output: Option<PathBuf>) -> Result<()> {
    let cancel = CancelToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received, cancelling fetch");
            signal_cancel.cancel();
        }
    });

    let resolver = LinkResolver::from_config(cfg);
    let descriptor = resolver.resolve(reference, &cancel).await?;
    let dest = output.unwrap_or_else(|| default_output(&descriptor.url));

    tracing::info!(url = %descriptor.url, dest = %dest.display(), "fetching");
    let fetcher = SegmentFetcher::from_config(cfg);
    fetcher.fetch(&descriptor, &dest, &cancel).await?;
    println!("saved {}", dest.display());
    Ok(())
}

/// Last path segment of the URL, or a generic name when the path has none.
fn default_output(url: &str) -> PathBuf {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.last())
                .filter(|n| !n.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from("download.mp4"))
}
