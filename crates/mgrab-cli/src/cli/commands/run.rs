//! `mgrab run` – drive a full batch through the pipeline.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mgrab_core::batch::{BatchRequest, Pipeline};
use mgrab_core::config::MgrabConfig;
use mgrab_core::control::CancelToken;
use mgrab_core::fetcher::SegmentFetcher;
use mgrab_core::postproc::FfmpegPostProcessor;
use mgrab_core::resolver::LinkResolver;
use mgrab_core::sink::HttpSink;

use crate::cli::events::ConsoleEvents;

pub async fn run_batch_command(
    cfg: &MgrabConfig,
    links: &Path,
    batch_name: &str,
    resolution: &str,
    dest: &str,
    owner: Option<String>,
) -> Result<()> {
    let references = read_references(links)?;
    if references.is_empty() {
        anyhow::bail!("no references found in {}", links.display());
    }

    let request = BatchRequest {
        batch_name: batch_name.to_string(),
        resolution: resolution.to_string(),
        references,
        owner: owner.unwrap_or_else(|| "local".to_string()),
    };

    let cancel = CancelToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received, cancelling batch");
            signal_cancel.cancel();
        }
    });

    let pipeline = Pipeline::new(
        Arc::new(LinkResolver::from_config(cfg)),
        Arc::new(SegmentFetcher::from_config(cfg)),
        Arc::new(FfmpegPostProcessor::from_config(cfg)),
        Arc::new(HttpSink::from_config(dest.to_string(), cfg)),
    )
    .with_events(Arc::new(ConsoleEvents::new()));

    let result = pipeline.run_batch(&request, &cancel).await?;

    println!("done: {}/{} succeeded", result.succeeded, result.total);
    for f in &result.failed {
        println!("failed: {}: {}", f.reference, f.reason);
    }
    Ok(())
}

fn read_references(links: &Path) -> Result<Vec<String>> {
    let data = std::fs::read_to_string(links)
        .with_context(|| format!("reading links file {}", links.display()))?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_references_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.txt");
        std::fs::write(&path, "https://a/1.mp4\n\n  \nhttps://b/2.m3u8\n").unwrap();
        let refs = read_references(&path).unwrap();
        assert_eq!(refs, vec!["https://a/1.mp4", "https://b/2.m3u8"]);
    }
}
