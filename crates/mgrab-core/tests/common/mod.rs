#![allow(dead_code)]

pub mod media_server;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mgrab_core::control::CancelToken;
use mgrab_core::fetcher::Remux;
use mgrab_core::tool::ToolError;

/// Remux stand-in that splices segment bytes directly; integration tests
/// exercise ordering and cleanup without an ffmpeg binary.
pub struct CatRemux;

#[async_trait]
impl Remux for CatRemux {
    async fn concat(
        &self,
        _dir: &Path,
        parts: &[PathBuf],
        dest: &Path,
        _cancel: &CancelToken,
    ) -> Result<(), ToolError> {
        let mut out = Vec::new();
        for part in parts {
            let bytes = std::fs::read(part).map_err(|source| ToolError::Io {
                tool: "cat".to_string(),
                source,
            })?;
            out.extend_from_slice(&bytes);
        }
        std::fs::write(dest, out).map_err(|source| ToolError::Io {
            tool: "cat".to_string(),
            source,
        })
    }
}

/// Remux stand-in that always fails, for remux-error paths.
pub struct FailingRemux;

#[async_trait]
impl Remux for FailingRemux {
    async fn concat(
        &self,
        _dir: &Path,
        _parts: &[PathBuf],
        dest: &Path,
        _cancel: &CancelToken,
    ) -> Result<(), ToolError> {
        // Leave a half-written output behind so callers must clean it up.
        let _ = std::fs::write(dest, b"garbage");
        Err(ToolError::ExitStatus {
            tool: "cat".to_string(),
            status: std::process::Command::new("false")
                .status()
                .expect("spawn false"),
        })
    }
}
