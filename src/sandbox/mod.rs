// ABOUTME: Sandbox lifecycle orchestration on top of the engine capability traits.
// ABOUTME: Registry, state machine, monitoring, exec and log retrieval.

mod error;
mod manager;
mod model;
mod monitor;
mod probe;
mod registry;
mod settings;

pub use error::{Error, Result};
pub use manager::{DEFAULT_LOG_TAIL, LifecycleManager};
pub use model::{
    Container, ContainerStatus, CreateRequest, ExecOutput, ExecRequest, LABEL_MANAGED,
    LABEL_OWNER, LABEL_SANDBOX, LogEntry, NAME_PREFIX, PortMapping, engine_name, volume_name,
};
pub use probe::{port_url, probe_once, wait_until_ready};
pub use settings::SandboxSettings;
