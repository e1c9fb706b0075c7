// ABOUTME: Per-sandbox background task started with each successful start.
// ABOUTME: Polls published ports for readiness and records the container's exit.

use super::model::{Container, ContainerStatus};
use super::probe;
use super::registry::Registry;
use crate::config::ReadinessConfig;
use crate::events::{EventBus, SandboxEvent};
use crate::runtime::FullRuntime;
use crate::types::{ContainerId, SandboxId};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::AbortHandle;

pub(super) struct Monitor<E> {
    pub engine: Arc<E>,
    pub registry: Arc<Registry>,
    pub events: EventBus,
    pub readiness: ReadinessConfig,
}

impl<E: FullRuntime> Monitor<E> {
    pub fn spawn(self, container: Container, engine_id: ContainerId) -> AbortHandle {
        tokio::spawn(self.run(container, engine_id)).abort_handle()
    }

    async fn run(self, container: Container, engine_id: ContainerId) {
        let id = container.id.clone();

        let exit = self.engine.wait_container(&engine_id);
        tokio::pin!(exit);

        let probes = join_all(
            container
                .ports
                .iter()
                .map(|mapping| self.watch_port(&id, mapping.container_port, mapping.host_port)),
        );

        let result = tokio::select! {
            result = &mut exit => result,
            _ = probes => exit.await,
        };

        match result {
            Ok(code) => {
                tracing::info!(id = %id, exit_code = code, "container exited");
                self.registry.transition_with(
                    &id,
                    &[ContainerStatus::Running],
                    ContainerStatus::Stopped,
                    |stopped| {
                        self.events.publish(SandboxEvent::Stopped {
                            container: stopped.clone(),
                        });
                    },
                );
            }
            Err(e) => tracing::warn!(id = %id, error = %e, "lost track of container exit"),
        }
    }

    async fn watch_port(&self, id: &SandboxId, container_port: u16, host_port: u16) {
        if !probe::wait_until_ready(host_port, &self.readiness).await {
            tracing::warn!(
                id = %id,
                container_port,
                host_port,
                attempts = self.readiness.attempts,
                "port never became ready"
            );
            return;
        }

        // Only announce while the sandbox is still registered and running.
        let url = probe::port_url(&self.readiness.host, host_port);
        let announced = self.registry.with_container(id, |container| {
            if container.status != ContainerStatus::Running {
                return false;
            }
            self.events.publish(SandboxEvent::PortReady {
                container: container.clone(),
                container_port,
                url: url.clone(),
            });
            true
        });
        if announced == Some(true) {
            tracing::info!(id = %id, container_port, url = %url, "port ready");
        }
    }
}
