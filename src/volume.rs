// ABOUTME: Per-sandbox workspace volumes.
// ABOUTME: Creation tolerates existing volumes; removal never fails the caller.

use crate::runtime::{VolumeConfig, VolumeError, VolumeOps};
use std::collections::HashMap;
use std::sync::Arc;

pub struct VolumeManager<V> {
    engine: Arc<V>,
}

impl<V: VolumeOps> VolumeManager<V> {
    pub fn new(engine: Arc<V>) -> Self {
        Self { engine }
    }

    /// Create the named volume. An existing volume of that name is reused.
    pub async fn create_volume(
        &self,
        name: &str,
        labels: HashMap<String, String>,
    ) -> Result<(), VolumeError> {
        let config = VolumeConfig {
            name: name.to_string(),
            labels,
        };
        match self.engine.create_volume(&config).await {
            Ok(()) => {
                tracing::debug!(volume = name, "created volume");
                Ok(())
            }
            Err(VolumeError::AlreadyExists(_)) => {
                tracing::debug!(volume = name, "volume already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the named volume, logging instead of returning failures.
    pub async fn remove_volume(&self, name: &str) {
        match self.engine.remove_volume(name, true).await {
            Ok(()) => tracing::debug!(volume = name, "removed volume"),
            Err(VolumeError::NotFound(_)) => {
                tracing::debug!(volume = name, "volume already gone")
            }
            Err(e) => tracing::warn!(volume = name, error = %e, "failed to remove volume"),
        }
    }
}
