// ABOUTME: Shared helper for connecting to the local container runtime.
// ABOUTME: Detects the engine socket, connects, and checks the daemon answers.

use sandcastle::error::Result;
use sandcastle::output::Output;
use sandcastle::runtime::{BollardRuntime, RuntimeConfig, RuntimeError, detect};

/// Connect to the container runtime on this host.
///
/// This handles the common pattern of:
/// 1. Resolving the runtime type and socket path (config override or detection)
/// 2. Outputting progress messages
/// 3. Establishing the connection and pinging the daemon
pub async fn connect_to_runtime(config: &RuntimeConfig, output: &Output) -> Result<BollardRuntime> {
    output.progress("  → Detecting runtime...");
    let runtime_info = detect(config).map_err(RuntimeError::from)?;

    output.progress(&format!(
        "  → Found {} at {}",
        runtime_info.runtime_type, runtime_info.socket_path
    ));

    let runtime = BollardRuntime::connect(&runtime_info)?;
    runtime.ping().await?;

    Ok(runtime)
}
