// ABOUTME: Error type for sandbox lifecycle operations.
// ABOUTME: Engine failures keep the engine's message; non-zero exec exits are not errors.

use super::model::ContainerStatus;
use crate::network::NetworkInitError;
use crate::ports::PortAllocationError;
use crate::runtime::VolumeError;
use crate::types::SandboxId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    NetworkInit(#[from] NetworkInitError),

    #[error(transparent)]
    PortAllocation(#[from] PortAllocationError),

    #[error("volume {name}: {source}")]
    Volume {
        name: String,
        #[source]
        source: VolumeError,
    },

    #[error("container not found: {0}")]
    ContainerNotFound(SandboxId),

    #[error("cannot {action} container {id} while it is {status}")]
    InvalidTransition {
        id: SandboxId,
        action: &'static str,
        status: ContainerStatus,
    },

    #[error("failed to {operation}: {message}")]
    Engine {
        operation: &'static str,
        message: String,
    },

    #[error("command did not finish within {0:?}")]
    ExecTimeout(Duration),
}

impl Error {
    pub(crate) fn engine(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Engine {
            operation,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
