// ABOUTME: Configuration types and parsing for sandcastle.yml.
// ABOUTME: Every field has a default; a missing or empty file means defaults.

mod allocation;
mod env_value;
mod init;
mod readiness;

pub use allocation::AllocationConfig;
pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use readiness::ReadinessConfig;

use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "sandcastle.yml";
pub const CONFIG_FILENAME_ALT: &str = "sandcastle.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".sandcastle/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Image used when a create request names none.
    #[serde(default = "default_image")]
    pub image: String,

    /// Bridge network every sandbox joins.
    #[serde(default = "default_network")]
    pub network: String,

    /// Mount point of the sandbox volume and default exec directory.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Container ports published when a create request names none.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Keeps the sandbox alive between exec calls.
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Upper bound on one exec call; `null` disables it.
    #[serde(default = "default_exec_timeout", with = "humantime_serde")]
    pub exec_timeout: Option<Duration>,

    #[serde(default)]
    pub allocation: AllocationConfig,

    #[serde(default)]
    pub readiness: ReadinessConfig,

    #[serde(flatten)]
    pub runtime: RuntimeConfig,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_image() -> String {
    "node:20-alpine".to_string()
}

fn default_network() -> String {
    "sandcastle".to_string()
}

fn default_working_dir() -> String {
    "/app".to_string()
}

fn default_ports() -> Vec<u16> {
    vec![3000, 5173, 8080]
}

fn default_command() -> Vec<String> {
    vec!["tail".into(), "-f".into(), "/dev/null".into()]
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_exec_timeout() -> Option<Duration> {
    Some(Duration::from_secs(600))
}

fn default_event_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Config {
            image: default_image(),
            network: default_network(),
            working_dir: default_working_dir(),
            ports: default_ports(),
            command: default_command(),
            env: HashMap::new(),
            labels: HashMap::new(),
            stop_timeout: default_stop_timeout(),
            exec_timeout: default_exec_timeout(),
            allocation: AllocationConfig::default(),
            readiness: ReadinessConfig::default(),
            runtime: RuntimeConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Parse and validate. A document with no content yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let config = if value.is_null() {
            Config::default()
        } else {
            serde_yaml::from_value(value)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Reject values the orchestrator cannot work with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: impl Into<String>) -> Result<()> {
            Err(Error::InvalidConfig(msg.into()))
        }

        if self.image.trim().is_empty() {
            return invalid("image cannot be empty");
        }
        if self.network.trim().is_empty() {
            return invalid("network cannot be empty");
        }
        if !self.working_dir.starts_with('/') {
            return invalid(format!(
                "working_dir must be an absolute path, got {:?}",
                self.working_dir
            ));
        }
        if self.ports.is_empty() {
            return invalid("ports cannot be empty");
        }
        if self.ports.contains(&0) {
            return invalid("port 0 cannot be published");
        }
        if self.command.is_empty() {
            return invalid("command cannot be empty");
        }
        if self.exec_timeout == Some(Duration::ZERO) {
            return invalid("exec_timeout must be positive; use null to disable it");
        }
        if self.allocation.max_attempts == 0 {
            return invalid("allocation.max_attempts must be at least 1");
        }
        if self.allocation.start == Some(0) {
            return invalid("allocation.start must be a non-zero port");
        }
        if self.allocation.bind_host.parse::<IpAddr>().is_err() {
            return invalid(format!(
                "allocation.bind_host is not an IP address: {:?}",
                self.allocation.bind_host
            ));
        }
        if self.readiness.attempts == 0 {
            return invalid("readiness.attempts must be at least 1");
        }
        if self.readiness.host.trim().is_empty() {
            return invalid("readiness.host cannot be empty");
        }
        if self.event_capacity == 0 {
            return invalid("event_capacity must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeType;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.image, "node:20-alpine");
        assert_eq!(config.ports, vec![3000, 5173, 8080]);
        assert_eq!(config.exec_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.readiness.attempts, 30);
        assert_eq!(config.allocation.max_attempts, 100);
    }

    #[test]
    fn comment_only_document_is_all_defaults() {
        let config = Config::from_yaml("# nothing here\n").unwrap();
        assert_eq!(config.network, "sandcastle");
    }

    #[test]
    fn parses_humantime_durations() {
        let config = Config::from_yaml(
            "stop_timeout: 3s\nexec_timeout: 2m\nreadiness:\n  interval: 250ms\n",
        )
        .unwrap();
        assert_eq!(config.stop_timeout, Duration::from_secs(3));
        assert_eq!(config.exec_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.readiness.interval, Duration::from_millis(250));
        assert_eq!(config.readiness.timeout, Duration::from_secs(2));
    }

    #[test]
    fn null_exec_timeout_disables_it() {
        let config = Config::from_yaml("exec_timeout: null\n").unwrap();
        assert_eq!(config.exec_timeout, None);
    }

    #[test]
    fn runtime_override_is_flattened() {
        let config =
            Config::from_yaml("runtime: podman\nsocket: /run/podman/podman.sock\n").unwrap();
        assert_eq!(config.runtime.runtime, Some(RuntimeType::Podman));
        assert_eq!(
            config.runtime.socket.as_deref(),
            Some("/run/podman/podman.sock")
        );
    }

    #[test]
    fn rejects_empty_ports() {
        let err = Config::from_yaml("ports: []\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_readiness_attempts() {
        let err = Config::from_yaml("readiness:\n  attempts: 0\n").unwrap_err();
        assert!(err.to_string().contains("readiness.attempts"));
    }

    #[test]
    fn rejects_relative_working_dir() {
        let err = Config::from_yaml("working_dir: app\n").unwrap_err();
        assert!(err.to_string().contains("working_dir"));
    }

    #[test]
    fn rejects_unparseable_bind_host() {
        let err = Config::from_yaml("allocation:\n  bind_host: everywhere\n").unwrap_err();
        assert!(err.to_string().contains("bind_host"));
    }
}
