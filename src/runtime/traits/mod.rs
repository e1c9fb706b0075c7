// ABOUTME: Composable capability traits for container engines.
// ABOUTME: Defines ContainerOps, NetworkOps, VolumeOps, ExecOps, LogOps and FullRuntime.

mod container;
mod exec;
mod logs;
mod network;
mod shared_types;
mod volume;

pub use container::{ContainerError, ContainerOps};
pub use exec::{ExecError, ExecOps};
pub use logs::{LogError, LogOps, LogOptions};
pub use network::{NetworkError, NetworkOps};
pub use shared_types::*;
pub use volume::{VolumeError, VolumeOps};

/// Every capability the sandbox orchestrator needs from an engine.
///
/// Implemented automatically for any type providing all of the capability traits.
pub trait FullRuntime:
    ContainerOps + NetworkOps + VolumeOps + ExecOps + LogOps + Send + Sync + 'static
{
}

impl<T> FullRuntime for T where
    T: ContainerOps + NetworkOps + VolumeOps + ExecOps + LogOps + Send + Sync + 'static
{
}
