// ABOUTME: Exec operations trait for container engines.
// ABOUTME: Execute commands inside running containers and collect their raw output.

use super::shared_types::{ExecConfig, ExecInfo};
use crate::types::{ContainerId, ExecId};
use async_trait::async_trait;
use bytes::Bytes;

/// Exec operations: run commands in containers.
#[async_trait]
pub trait ExecOps: Send + Sync {
    /// Create an exec instance without starting it.
    async fn exec_create(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecId, ExecError>;

    /// Start an exec instance attached and return its output once it finishes.
    ///
    /// The returned bytes are the engine's multiplexed stdout/stderr stream,
    /// still framed. Use [`crate::stream::decode`] to split it.
    async fn exec_start(&self, exec_id: &ExecId) -> Result<Bytes, ExecError>;

    /// Inspect an exec instance.
    async fn exec_inspect(&self, exec_id: &ExecId) -> Result<ExecInfo, ExecError>;
}

/// Errors from exec operations.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container not running: {0}")]
    ContainerNotRunning(String),

    #[error("exec instance not found: {0}")]
    ExecNotFound(String),

    #[error("exec failed: {0}")]
    Failed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
