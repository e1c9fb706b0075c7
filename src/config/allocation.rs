// ABOUTME: Host port allocation configuration.
// ABOUTME: Search start, probe bind address, and the per-port attempt budget.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllocationConfig {
    /// First candidate for every host port. Unset means start at the
    /// container port itself.
    #[serde(default)]
    pub start: Option<u16>,

    /// Address transient listeners bind to when probing a port.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Candidate ports tried per requested container port.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_attempts() -> u32 {
    100
}

impl Default for AllocationConfig {
    fn default() -> Self {
        AllocationConfig {
            start: None,
            bind_host: default_bind_host(),
            max_attempts: default_max_attempts(),
        }
    }
}
