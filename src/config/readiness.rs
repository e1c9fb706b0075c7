// ABOUTME: Port readiness probe configuration.
// ABOUTME: Bounded HTTP polling parameters with sensible defaults.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadinessConfig {
    /// Host used both to probe and in the published `port-ready` URL.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_attempts() -> u32 {
    30
}

fn default_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        ReadinessConfig {
            host: default_host(),
            attempts: default_attempts(),
            interval: default_interval(),
            timeout: default_timeout(),
        }
    }
}
