// ABOUTME: Volume operations trait for container engines.
// ABOUTME: Create and remove the named volumes backing sandbox workspaces.

use super::shared_types::VolumeConfig;
use async_trait::async_trait;

/// Named volume operations.
#[async_trait]
pub trait VolumeOps: Send + Sync {
    /// Create a named volume.
    async fn create_volume(&self, config: &VolumeConfig) -> Result<(), VolumeError>;

    /// Remove a named volume.
    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), VolumeError>;
}

/// Errors from volume operations.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("volume not found: {0}")]
    NotFound(String),

    #[error("volume already exists: {0}")]
    AlreadyExists(String),

    #[error("volume in use: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
