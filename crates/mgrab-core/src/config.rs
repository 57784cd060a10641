use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::probe::NetTimeouts;
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per connection (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Post-processing (transcode) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// When false the post-processor is a pass-through and the raw artifact
    /// is uploaded unchanged.
    pub enabled: bool,
    /// Video codec handed to ffmpeg (`-c:v`).
    pub codec: String,
    /// Constant rate factor (`-crf`), perceptually-lossy quality knob.
    pub crf: u32,
    /// Encoder preset (`-preset`).
    pub preset: String,
    /// Wall-clock ceiling in seconds for one encode; a stuck encoder is
    /// killed rather than blocking the batch.
    pub ceiling_secs: u64,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            codec: "libx265".to_string(),
            crf: 24,
            preset: "fast".to_string(),
            ceiling_secs: 7200,
        }
    }
}

/// One indirect-source rule: references whose host contains `host` get a
/// secondary landing-page fetch, and the embedded stream URL is recognized
/// by `marker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndirectSourceConfig {
    pub host: String,
    pub marker: String,
}

/// Resolver rules, evaluated in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_indirect_sources")]
    pub indirect: Vec<IndirectSourceConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            indirect: default_indirect_sources(),
        }
    }
}

fn default_indirect_sources() -> Vec<IndirectSourceConfig> {
    vec![IndirectSourceConfig {
        host: "visionias".to_string(),
        marker: "playlist.m3u8".to_string(),
    }]
}

/// Global configuration loaded from `~/.config/mgrab/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MgrabConfig {
    /// Maximum parallel connections for one job's fetch stage (range parts
    /// or manifest segments).
    pub max_connections: usize,
    /// Upload chunk size in bytes; one progress event per chunk.
    pub upload_chunk_bytes: usize,
    /// TCP connect timeout in seconds for every network operation.
    pub connect_timeout_secs: u64,
    /// Per-transfer stall/IO timeout in seconds.
    pub io_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Transcode settings.
    #[serde(default)]
    pub encode: EncodeConfig,
    /// Resolver indirect-source table.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Default for MgrabConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            upload_chunk_bytes: 512 * 1024,
            connect_timeout_secs: 15,
            io_timeout_secs: 300,
            retry: None,
            encode: EncodeConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl MgrabConfig {
    /// Retry policy from the `[retry]` section, or built-in defaults.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryPolicy::from_config)
            .unwrap_or_default()
    }

    /// Network timeouts shared by probe, fetch, resolve, and upload.
    pub fn timeouts(&self) -> NetTimeouts {
        NetTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            io: Duration::from_secs(self.io_timeout_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mgrab")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MgrabConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MgrabConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MgrabConfig = toml::from_str(&data)?;
    Ok(cfg)
}
