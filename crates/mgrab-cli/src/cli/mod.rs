//! CLI for the mgrab batch media-acquisition pipeline.

mod commands;
mod events;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mgrab_core::config;

use commands::{run_batch_command, run_fetch, run_resolve};

/// Top-level CLI for mgrab.
#[derive(Debug, Parser)]
#[command(name = "mgrab")]
#[command(about = "mgrab: batch media acquisition pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run a full batch: resolve, fetch, post-process, and upload each link.
    Run {
        /// File with one reference per line (blank lines skipped).
        #[arg(long)]
        links: PathBuf,

        /// Batch name; used for working directories, file names, and captions.
        #[arg(long)]
        batch_name: String,

        /// Resolution label carried into upload captions (e.g. "720").
        #[arg(long)]
        resolution: String,

        /// Destination upload endpoint URL.
        #[arg(long)]
        dest: String,

        /// Owner identifier checked against the authorizer.
        #[arg(long)]
        owner: Option<String>,
    },

    /// Resolve one reference and print the resulting stream descriptor.
    Resolve {
        /// Raw reference (direct URL or indirect landing page).
        reference: String,
    },

    /// Fetch one reference to a local file, skipping post-process and upload.
    Fetch {
        /// Raw reference to resolve and download.
        reference: String,

        /// Output path; defaults to the URL's file name.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                links,
                batch_name,
                resolution,
                dest,
                owner,
            } => {
                run_batch_command(&cfg, &links, &batch_name, &resolution, &dest, owner).await?;
            }
            CliCommand::Resolve { reference } => run_resolve(&cfg, &reference).await?,
            CliCommand::Fetch { reference, output } => {
                run_fetch(&cfg, &reference, output).await?;
            }
        }

        Ok(())
    }
}
