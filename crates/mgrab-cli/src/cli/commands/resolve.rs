//! `mgrab resolve` – print the stream descriptor for one reference.

use anyhow::Result;
use mgrab_core::config::MgrabConfig;
use mgrab_core::control::CancelToken;
use mgrab_core::resolver::{LinkResolver, Resolve};

pub async fn run_resolve(cfg: &MgrabConfig, reference: &str) -> Result<()> {
    let resolver = LinkResolver::from_config(cfg);
    let descriptor = resolver.resolve(reference, &CancelToken::new()).await?;
    println!("kind: {:?}", descriptor.kind);
    println!("url:  {}", descriptor.url);
    Ok(())
}
