// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Writes a commented sandcastle.yml listing every default.

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

/// Write `sandcastle.yml` into `dir`, refusing to replace an existing file
/// unless `force` is set.
pub fn init_config(dir: &Path, image: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::default();
    if let Some(image) = image {
        if image.trim().is_empty() || image.chars().any(char::is_whitespace) {
            return Err(Error::InvalidConfig(format!("invalid image: {image:?}")));
        }
        config.image = image.to_string();
    }

    std::fs::write(&config_path, generate_template_yaml(&config))?;
    tracing::info!(path = %config_path.display(), "wrote config template");

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    let ports = config
        .ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let command = config
        .command
        .iter()
        .map(|arg| format!("{arg:?}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"# Image used when a sandbox is created without one
image: {image}

# Bridge network shared by all sandboxes
network: {network}

# Volume mount point and default directory for exec
working_dir: {working_dir}

# Container ports published on the host
ports: [{ports}]

# Keeps the sandbox alive between commands
command: [{command}]

# Injected into every sandbox; values may come from the host environment
# env:
#   NODE_ENV: development
#   NPM_TOKEN: {{ env: SANDCASTLE_NPM_TOKEN }}

stop_timeout: {stop_timeout}
# null disables the limit
exec_timeout: {exec_timeout}

allocation:
  bind_host: {bind_host}
  max_attempts: {max_attempts}
  # start: 20000

readiness:
  host: {readiness_host}
  attempts: {attempts}
  interval: {interval}
  timeout: {timeout}

# Override engine detection
# runtime: podman
# socket: /run/user/1000/podman/podman.sock
"#,
        image = config.image,
        network = config.network,
        working_dir = config.working_dir,
        stop_timeout = format_duration(config.stop_timeout),
        exec_timeout = config
            .exec_timeout
            .map(format_duration)
            .unwrap_or_else(|| "null".to_string()),
        bind_host = config.allocation.bind_host,
        max_attempts = config.allocation.max_attempts,
        readiness_host = config.readiness.host,
        attempts = config.readiness.attempts,
        interval = format_duration(config.readiness.interval),
        timeout = format_duration(config.readiness.timeout),
    )
}

/// Shortest humantime spelling for the whole-unit durations used as defaults.
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if d.subsec_nanos() != 0 {
        format!("{}ms", d.as_millis())
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
