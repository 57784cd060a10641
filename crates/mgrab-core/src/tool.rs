//! External tool invocation (ffmpeg).
//!
//! Both the manifest remux and the transcode stage shell out to ffmpeg; the
//! exit code is the sole success signal. Every invocation carries a
//! wall-clock ceiling so a stuck encoder cannot block the batch, and the
//! batch cancel token kills the child promptly.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;

use crate::control::CancelToken;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} I/O failure: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}")]
    ExitStatus {
        tool: String,
        status: std::process::ExitStatus,
    },
    #[error("{tool} exceeded the {ceiling_secs}s wall-clock ceiling")]
    Ceiling { tool: String, ceiling_secs: u64 },
    #[error("cancelled")]
    Cancelled,
}

/// Runs `tool` with `args`, treating a zero exit code as the only success.
///
/// The child is killed (and the error returned) when the wall-clock ceiling
/// elapses or the cancel token fires. Stdio is discarded; tools are expected
/// to communicate through their exit code and the filesystem.
pub async fn run_tool(
    tool: &str,
    args: &[OsString],
    ceiling: Duration,
    cancel: &CancelToken,
) -> Result<(), ToolError> {
    tracing::debug!(tool, ?args, "spawning external tool");

    let mut child = tokio::process::Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|source| ToolError::Io {
                tool: tool.to_string(),
                source,
            })?;
            if status.success() {
                Ok(())
            } else {
                Err(ToolError::ExitStatus {
                    tool: tool.to_string(),
                    status,
                })
            }
        }
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            Err(ToolError::Cancelled)
        }
        _ = tokio::time::sleep(ceiling) => {
            tracing::warn!(tool, ceiling_secs = ceiling.as_secs(), "tool hit wall-clock ceiling");
            let _ = child.kill().await;
            Err(ToolError::Ceiling {
                tool: tool.to_string(),
                ceiling_secs: ceiling.as_secs(),
            })
        }
    }
}
