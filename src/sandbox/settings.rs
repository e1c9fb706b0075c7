// ABOUTME: Resolved, validated settings the lifecycle manager runs with.
// ABOUTME: Built from Config once; host environment lookups happen here.

use crate::config::{Config, ReadinessConfig, resolve_env_map};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SandboxSettings {
    pub image: String,
    pub network: String,
    pub working_dir: String,
    pub ports: Vec<u16>,
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub stop_timeout: Duration,
    pub exec_timeout: Option<Duration>,
    pub port_search_start: Option<u16>,
    pub bind_host: IpAddr,
    pub max_port_attempts: u32,
    pub readiness: ReadinessConfig,
    pub event_capacity: usize,
}

impl SandboxSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let bind_host = config
            .allocation
            .bind_host
            .parse::<IpAddr>()
            .map_err(|e| Error::InvalidConfig(format!("allocation.bind_host: {e}")))?;

        Ok(Self {
            image: config.image.clone(),
            network: config.network.clone(),
            working_dir: config.working_dir.clone(),
            ports: config.ports.clone(),
            command: config.command.clone(),
            env: resolve_env_map(&config.env)?,
            labels: config.labels.clone(),
            stop_timeout: config.stop_timeout,
            exec_timeout: config.exec_timeout,
            port_search_start: config.allocation.start,
            bind_host,
            max_port_attempts: config.allocation.max_attempts,
            readiness: config.readiness.clone(),
            event_capacity: config.event_capacity,
        })
    }
}

impl Default for SandboxSettings {
    fn default() -> Self {
        let config = Config::default();
        Self {
            image: config.image,
            network: config.network,
            working_dir: config.working_dir,
            ports: config.ports,
            command: config.command,
            env: HashMap::new(),
            labels: config.labels,
            stop_timeout: config.stop_timeout,
            exec_timeout: config.exec_timeout,
            port_search_start: config.allocation.start,
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_port_attempts: config.allocation.max_attempts,
            readiness: config.readiness,
            event_capacity: config.event_capacity,
        }
    }
}
