// ABOUTME: Log operations trait for container engines.
// ABOUTME: Fetch the tail of a container's framed log stream.

use crate::types::ContainerId;
use async_trait::async_trait;
use bytes::Bytes;

/// Log retrieval operations.
#[async_trait]
pub trait LogOps: Send + Sync {
    /// Fetch logs from a container as the engine's multiplexed byte stream.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Bytes, LogError>;
}

/// Options for log retrieval.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Include stdout.
    pub stdout: bool,
    /// Include stderr.
    pub stderr: bool,
    /// Prefix each line with an RFC 3339 timestamp.
    pub timestamps: bool,
    /// Number of lines to return from the end (None = all).
    pub tail: Option<u64>,
}

impl LogOptions {
    /// Both streams, timestamped, last `n` lines.
    pub fn tail(n: u64) -> Self {
        Self {
            stdout: true,
            stderr: true,
            timestamps: true,
            tail: Some(n),
        }
    }
}

/// Errors from log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
