//! Post-processing stage: shrink the fetched artifact with a transcode
//! before upload.
//!
//! The stage is optional; when disabled it is a pass-through and the raw
//! artifact moves on untouched. The transcode re-encodes video only, audio
//! is stream-copied.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{EncodeConfig, MgrabConfig};
use crate::control::CancelToken;
use crate::error::EncodeError;
use crate::tool::run_tool;

/// Transcode parameters handed to ffmpeg.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub codec: String,
    pub crf: u32,
    pub preset: String,
    pub ceiling: Duration,
}

impl From<&EncodeConfig> for EncodeSettings {
    fn from(cfg: &EncodeConfig) -> Self {
        Self {
            codec: cfg.codec.clone(),
            crf: cfg.crf,
            preset: cfg.preset.clone(),
            ceiling: Duration::from_secs(cfg.ceiling_secs),
        }
    }
}

/// Post-processor seam. `process` returns `true` when it wrote `output`;
/// `false` means pass-through and the caller keeps using `input`.
#[async_trait]
pub trait PostProcess: Send + Sync {
    async fn process(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<bool, EncodeError>;
}

enum Mode {
    Transcode(EncodeSettings),
    PassThrough,
}

/// Default post-processor: ffmpeg transcode, or a no-op when disabled.
pub struct FfmpegPostProcessor {
    mode: Mode,
}

impl FfmpegPostProcessor {
    pub fn transcode(settings: EncodeSettings) -> Self {
        Self {
            mode: Mode::Transcode(settings),
        }
    }

    pub fn pass_through() -> Self {
        Self {
            mode: Mode::PassThrough,
        }
    }

    pub fn from_config(cfg: &MgrabConfig) -> Self {
        if cfg.encode.enabled {
            Self::transcode(EncodeSettings::from(&cfg.encode))
        } else {
            Self::pass_through()
        }
    }
}

fn encode_args(settings: &EncodeSettings, input: &Path, output: &Path) -> Vec<OsString> {
    vec![
        OsString::from("-i"),
        input.to_path_buf().into_os_string(),
        OsString::from("-c:v"),
        OsString::from(settings.codec.as_str()),
        OsString::from("-crf"),
        OsString::from(settings.crf.to_string()),
        OsString::from("-preset"),
        OsString::from(settings.preset.as_str()),
        OsString::from("-c:a"),
        OsString::from("copy"),
        OsString::from("-y"),
        output.to_path_buf().into_os_string(),
    ]
}

#[async_trait]
impl PostProcess for FfmpegPostProcessor {
    async fn process(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<bool, EncodeError> {
        let settings = match &self.mode {
            Mode::PassThrough => {
                tracing::debug!(input = %input.display(), "post-processing disabled, passing through");
                return Ok(false);
            }
            Mode::Transcode(s) => s,
        };

        tracing::info!(
            input = %input.display(),
            codec = %settings.codec,
            crf = settings.crf,
            "transcoding artifact"
        );
        let args = encode_args(settings, input, output);
        if let Err(e) = run_tool("ffmpeg", &args, settings.ceiling, cancel).await {
            // ffmpeg may leave a truncated output behind when killed.
            if output.exists() {
                let _ = std::fs::remove_file(output);
            }
            return Err(e.into());
        }
        Ok(true)
    }
}
