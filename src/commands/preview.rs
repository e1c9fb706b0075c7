// ABOUTME: Preview command implementation.
// ABOUTME: Creates and starts a sandbox, runs commands, streams events until Ctrl-C, then tears down.

use super::runtime_connection::connect_to_runtime;
use sandcastle::config::Config;
use sandcastle::error::Result;
use sandcastle::output::Output;
use sandcastle::runtime::FullRuntime;
use sandcastle::sandbox::{CreateRequest, ExecRequest, LifecycleManager, SandboxSettings};
use sandcastle::types::{OwnerKey, SandboxId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// How long the event printer may take to drain after teardown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct PreviewArgs {
    pub owner: String,
    pub image: Option<String>,
    pub ports: Vec<u16>,
    pub exec: Vec<String>,
    pub logs: u64,
    pub snapshot: Option<String>,
}

/// Run one sandbox from creation to teardown.
pub async fn preview(config: Config, args: PreviewArgs, output: Output) -> Result<()> {
    let owner = OwnerKey::new(&args.owner)?;
    let settings = SandboxSettings::from_config(&config)?;
    let runtime = connect_to_runtime(&config.runtime, &output).await?;

    let output = Arc::new(output);
    let manager = LifecycleManager::new(runtime, settings);
    let printer = spawn_event_printer(&manager, Arc::clone(&output));

    let mut request = CreateRequest::new(owner);
    if let Some(image) = args.image.clone() {
        request = request.image(image);
    }
    if !args.ports.is_empty() {
        request = request.ports(args.ports.iter().copied());
    }
    if let Some(snapshot) = args.snapshot.clone() {
        request = request.snapshot_id(snapshot);
    }

    output.progress("  → Creating sandbox...");
    let container = manager.create_container(request).await?;

    let result = run_session(&manager, &container.id, &args, &output).await;

    output.progress("  → Tearing down...");
    let teardown = manager.destroy_container(&container.id).await;

    drop(manager);
    if tokio::time::timeout(DRAIN_TIMEOUT, printer).await.is_err() {
        tracing::debug!("event printer did not finish draining");
    }

    result?;
    teardown?;
    output.success(&format!("Sandbox {} removed", container.id));
    Ok(())
}

async fn run_session<E: FullRuntime>(
    manager: &LifecycleManager<E>,
    id: &SandboxId,
    args: &PreviewArgs,
    output: &Output,
) -> Result<()> {
    output.progress("  → Starting sandbox...");
    manager.start_container(id).await?;

    for command in &args.exec {
        let result = manager
            .execute_command(id, ExecRequest::new(command.as_str()))
            .await?;
        output.exec_result(command, &result);
    }

    output.progress("  → Watching events (Ctrl-C to stop)...");
    tokio::signal::ctrl_c().await?;

    if args.logs > 0 {
        let entries = manager.get_container_logs(id, args.logs).await?;
        output.logs(&entries);
    }
    Ok(())
}

fn spawn_event_printer<E: FullRuntime>(
    manager: &LifecycleManager<E>,
    output: Arc<Output>,
) -> tokio::task::JoinHandle<()> {
    let mut events = manager.events().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => output.event(&event),
                Err(RecvError::Lagged(missed)) => {
                    output.warning(&format!("missed {missed} events"));
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
