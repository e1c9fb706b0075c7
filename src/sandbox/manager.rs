// ABOUTME: Lifecycle manager: create, start, stop, destroy, exec and logs for sandboxes.
// ABOUTME: Owns the registry, allocates ports and volumes, and publishes lifecycle events.

use super::error::{Error, Result};
use super::model::{
    Container, ContainerStatus, CreateRequest, ExecOutput, ExecRequest, LogEntry, PortMapping,
    engine_name, sandbox_labels, volume_name,
};
use super::monitor::Monitor;
use super::registry::Registry;
use super::settings::SandboxSettings;
use crate::events::{EventBus, SandboxEvent};
use crate::network::NetworkProvisioner;
use crate::ports::PortAllocator;
use crate::runtime::{
    ContainerConfig, ContainerError, ExecConfig, FullRuntime, LogOptions, Protocol, PublishedPort,
    VolumeMount,
};
use crate::stream::{self, StreamKind};
use crate::types::{ContainerId, OwnerKey, SandboxId};
use crate::volume::VolumeManager;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Default number of log lines returned by [`LifecycleManager::get_container_logs`].
pub const DEFAULT_LOG_TAIL: u64 = 100;

/// Delay between exec inspections while the engine still reports it running.
const EXEC_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

/// Upper bound on waiting for an exec to settle once its output has closed.
const EXEC_SETTLE_MAX_WAIT: std::time::Duration = std::time::Duration::from_secs(30);

/// Orchestrates sandbox containers on a single engine.
///
/// Cheap to clone; clones share the registry, event bus and allocations.
pub struct LifecycleManager<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for LifecycleManager<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<E> {
    engine: Arc<E>,
    settings: SandboxSettings,
    registry: Arc<Registry>,
    events: EventBus,
    ports: PortAllocator,
    network: NetworkProvisioner<E>,
    volumes: VolumeManager<E>,
    last_stamp: AtomicI64,
}

impl<E> Drop for Inner<E> {
    fn drop(&mut self) {
        self.registry.abort_all_monitors();
    }
}

impl<E: FullRuntime> LifecycleManager<E> {
    /// Build a manager over `engine`.
    ///
    /// The engine must provide every capability; anything short of a
    /// [`FullRuntime`] is rejected at compile time:
    ///
    /// ```compile_fail,E0277
    /// use sandcastle::sandbox::{LifecycleManager, SandboxSettings};
    ///
    /// struct NotAnEngine;
    ///
    /// let _manager = LifecycleManager::new(NotAnEngine, SandboxSettings::default());
    /// ```
    pub fn new(engine: E, settings: SandboxSettings) -> Self {
        let engine = Arc::new(engine);
        let network_labels = HashMap::from([(
            super::model::LABEL_MANAGED.to_string(),
            "true".to_string(),
        )]);

        let inner = Inner {
            network: NetworkProvisioner::new(
                Arc::clone(&engine),
                settings.network.clone(),
                network_labels,
            ),
            volumes: VolumeManager::new(Arc::clone(&engine)),
            ports: PortAllocator::new(settings.bind_host, settings.max_port_attempts),
            events: EventBus::new(settings.event_capacity),
            registry: Arc::new(Registry::default()),
            last_stamp: AtomicI64::new(0),
            engine,
            settings,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn settings(&self) -> &SandboxSettings {
        &self.inner.settings
    }

    pub fn engine(&self) -> &E {
        &self.inner.engine
    }

    /// Make sure the shared network exists. Called by every create.
    pub async fn ensure_network(&self) -> Result<()> {
        self.inner.network.ensure_network().await?;
        Ok(())
    }

    pub async fn create_container(&self, request: CreateRequest) -> Result<Container> {
        let inner = &self.inner;
        inner.network.ensure_network().await?;

        let image = request
            .image
            .unwrap_or_else(|| inner.settings.image.clone());
        let container_ports = dedup_ports(
            request
                .ports
                .unwrap_or_else(|| inner.settings.ports.clone()),
        );

        let stamp = self.next_stamp();
        let id = SandboxId::for_owner(&request.owner_key, stamp);
        let name = engine_name(&request.owner_key, stamp);
        let volume = volume_name(&name);
        let labels = sandbox_labels(&id, &request.owner_key, &inner.settings.labels);

        let ports = self.allocate_ports(&container_ports)?;
        let host_ports: Vec<u16> = ports.iter().map(|p| p.host_port).collect();

        if let Err(source) = inner.volumes.create_volume(&volume, labels.clone()).await {
            inner.ports.release(host_ports);
            return Err(Error::Volume {
                name: volume,
                source,
            });
        }

        let config = ContainerConfig {
            name: name.clone(),
            image: image.clone(),
            env: inner.settings.env.clone(),
            labels,
            ports: ports
                .iter()
                .map(|p| PublishedPort {
                    host_port: p.host_port,
                    container_port: p.container_port,
                    protocol: p.protocol,
                    host_ip: None,
                })
                .collect(),
            volumes: vec![VolumeMount {
                source: volume.clone(),
                target: inner.settings.working_dir.clone(),
                read_only: false,
            }],
            command: Some(inner.settings.command.clone()),
            working_dir: Some(inner.settings.working_dir.clone()),
            network: Some(inner.settings.network.clone()),
            stop_timeout: Some(inner.settings.stop_timeout),
        };

        let engine_id = match inner.engine.create_container(&config).await {
            Ok(engine_id) => engine_id,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "container create failed; cleaning up");
                inner.volumes.remove_volume(&volume).await;
                inner.ports.release(host_ports);
                return Err(Error::engine("create container", e));
            }
        };

        let created_at = stamp_time(stamp);
        let container = Container {
            id: id.clone(),
            name,
            image,
            status: ContainerStatus::Creating,
            ports,
            owner_key: request.owner_key,
            snapshot_id: request.snapshot_id,
            created_at,
            updated_at: created_at,
        };

        inner
            .registry
            .insert_with(container.clone(), engine_id.clone(), |created| {
                inner.events.publish(SandboxEvent::Created {
                    container: created.clone(),
                });
            });
        tracing::info!(id = %id, engine_id = %engine_id, "created container");

        Ok(container)
    }

    pub async fn start_container(&self, id: &SandboxId) -> Result<Container> {
        let inner = &self.inner;
        let (engine_id, status) = self.handle(id)?;
        if !matches!(status, ContainerStatus::Creating | ContainerStatus::Stopped) {
            return Err(Error::InvalidTransition {
                id: id.clone(),
                action: "start",
                status,
            });
        }

        if let Err(e) = inner.engine.start_container(&engine_id).await {
            let message = e.to_string();
            tracing::warn!(id = %id, error = %message, "container start failed");
            inner.registry.transition_with(
                id,
                &[ContainerStatus::Creating, ContainerStatus::Stopped],
                ContainerStatus::Error,
                |failed| {
                    inner.events.publish(SandboxEvent::Error {
                        container: failed.clone(),
                        message: message.clone(),
                    });
                },
            );
            return Err(Error::Engine {
                operation: "start container",
                message,
            });
        }

        let container = inner
            .registry
            .transition_with(
                id,
                &[ContainerStatus::Creating, ContainerStatus::Stopped],
                ContainerStatus::Running,
                |started| {
                    inner.events.publish(SandboxEvent::Started {
                        container: started.clone(),
                    });
                },
            )
            .ok_or_else(|| self.changed_underneath(id, "start"))?;

        tracing::info!(id = %id, "started container");

        let monitor = Monitor {
            engine: Arc::clone(&inner.engine),
            registry: Arc::clone(&inner.registry),
            events: inner.events.clone(),
            readiness: inner.settings.readiness.clone(),
        };
        let handle = monitor.spawn(container.clone(), engine_id);
        inner.registry.set_monitor(id, handle);

        Ok(container)
    }

    pub async fn stop_container(&self, id: &SandboxId) -> Result<Container> {
        let inner = &self.inner;
        let (engine_id, status) = self.handle(id)?;
        match status {
            ContainerStatus::Running => {}
            ContainerStatus::Stopped => {
                return self
                    .get_container(id)
                    .ok_or_else(|| Error::ContainerNotFound(id.clone()));
            }
            other => {
                return Err(Error::InvalidTransition {
                    id: id.clone(),
                    action: "stop",
                    status: other,
                });
            }
        }

        inner.registry.abort_monitor(id);

        match inner
            .engine
            .stop_container(&engine_id, inner.settings.stop_timeout)
            .await
        {
            Ok(()) | Err(ContainerError::NotRunning(_)) => {}
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "container stop failed");
                inner.registry.transition(
                    id,
                    &[ContainerStatus::Running],
                    ContainerStatus::Error,
                );
                return Err(Error::engine("stop container", e));
            }
        }

        let stopped = inner.registry.transition_with(
            id,
            &[ContainerStatus::Running],
            ContainerStatus::Stopped,
            |stopped| {
                inner.events.publish(SandboxEvent::Stopped {
                    container: stopped.clone(),
                });
            },
        );
        match stopped {
            Some(container) => {
                tracing::info!(id = %id, "stopped container");
                Ok(container)
            }
            None => self
                .get_container(id)
                .ok_or_else(|| Error::ContainerNotFound(id.clone())),
        }
    }

    pub async fn destroy_container(&self, id: &SandboxId) -> Result<()> {
        let inner = &self.inner;
        let (engine_id, status) = self.handle(id)?;

        if status == ContainerStatus::Running {
            if let Err(e) = self.stop_container(id).await {
                tracing::warn!(id = %id, error = %e, "stop before destroy failed; forcing removal");
            }
        }
        inner.registry.abort_monitor(id);

        match inner.engine.remove_container(&engine_id, true).await {
            Ok(()) => {}
            Err(ContainerError::NotFound(_)) => {
                tracing::warn!(id = %id, "engine container already gone");
            }
            Err(e) => return Err(Error::engine("remove container", e)),
        }

        let Some(container) = inner.registry.remove(id) else {
            return Err(Error::ContainerNotFound(id.clone()));
        };
        inner.volumes.remove_volume(&container.volume_name()).await;
        inner.ports.release(container.host_ports());

        tracing::info!(id = %id, "destroyed container");
        inner.events.publish(SandboxEvent::Destroyed { container });
        Ok(())
    }

    pub async fn execute_command(&self, id: &SandboxId, request: ExecRequest) -> Result<ExecOutput> {
        let (engine_id, _) = self.handle(id)?;
        let config = ExecConfig {
            cmd: vec!["sh".to_string(), "-c".to_string(), request.command.clone()],
            env: exec_env(&request.env),
            working_dir: Some(
                request
                    .working_dir
                    .unwrap_or_else(|| self.inner.settings.working_dir.clone()),
            ),
            ..Default::default()
        };

        tracing::debug!(id = %id, command = %request.command, "executing command");
        let run = self.run_exec(&engine_id, &config);
        let (raw, exit_code) = match self.inner.settings.exec_timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| Error::ExecTimeout(limit))??,
            None => run.await?,
        };

        let output = collect_exec_output(&raw, exit_code);
        tracing::debug!(id = %id, exit_code = output.exit_code, "command finished");
        Ok(output)
    }

    pub async fn get_container_logs(&self, id: &SandboxId, tail: u64) -> Result<Vec<LogEntry>> {
        let (engine_id, _) = self.handle(id)?;
        let raw = self
            .inner
            .engine
            .container_logs(&engine_id, &LogOptions::tail(tail))
            .await
            .map_err(|e| Error::engine("fetch logs", e))?;

        let entries = parse_log_entries(&raw);
        if !entries.is_empty() {
            self.inner.registry.with_container(id, |container| {
                self.inner.events.publish(SandboxEvent::Logs {
                    container: container.clone(),
                    entries: entries.clone(),
                });
            });
        }
        Ok(entries)
    }

    pub fn get_container(&self, id: &SandboxId) -> Option<Container> {
        self.inner.registry.get(id)
    }

    pub fn get_container_by_owner_key(&self, owner: &OwnerKey) -> Option<Container> {
        self.inner.registry.find_by_owner(owner)
    }

    pub fn get_all_containers(&self) -> Vec<Container> {
        self.inner.registry.all()
    }

    fn handle(&self, id: &SandboxId) -> Result<(ContainerId, ContainerStatus)> {
        self.inner
            .registry
            .engine_handle(id)
            .ok_or_else(|| Error::ContainerNotFound(id.clone()))
    }

    /// Error for a sandbox whose status changed while an engine call was in flight.
    fn changed_underneath(&self, id: &SandboxId, action: &'static str) -> Error {
        match self.inner.registry.get(id) {
            Some(container) => Error::InvalidTransition {
                id: id.clone(),
                action,
                status: container.status,
            },
            None => Error::ContainerNotFound(id.clone()),
        }
    }

    /// Creation stamp in epoch millis, strictly increasing per manager.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .inner
            .last_stamp
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    fn allocate_ports(&self, container_ports: &[u16]) -> Result<Vec<PortMapping>> {
        let inner = &self.inner;
        let mut mappings = Vec::with_capacity(container_ports.len());
        for &container_port in container_ports {
            let start = inner.settings.port_search_start.unwrap_or(container_port);
            match inner.ports.allocate(start) {
                Ok(host_port) => mappings.push(PortMapping {
                    container_port,
                    host_port,
                    protocol: Protocol::Tcp,
                }),
                Err(e) => {
                    inner.ports.release(mappings.iter().map(|m| m.host_port));
                    return Err(e.into());
                }
            }
        }
        Ok(mappings)
    }

    async fn run_exec(
        &self,
        engine_id: &ContainerId,
        config: &ExecConfig,
    ) -> Result<(bytes::Bytes, i64)> {
        let engine = &self.inner.engine;
        let exec_id = engine
            .exec_create(engine_id, config)
            .await
            .map_err(|e| Error::engine("create exec", e))?;
        let raw = engine
            .exec_start(&exec_id)
            .await
            .map_err(|e| Error::engine("start exec", e))?;

        // The output stream can close before the engine records the exit code.
        let started = tokio::time::Instant::now();
        loop {
            let info = engine
                .exec_inspect(&exec_id)
                .await
                .map_err(|e| Error::engine("inspect exec", e))?;
            if !info.running {
                return Ok((raw, info.exit_code.unwrap_or(-1)));
            }
            if started.elapsed() >= EXEC_SETTLE_MAX_WAIT {
                tracing::warn!(exec_id = %exec_id, "exec still running after output closed");
                return Ok((raw, info.exit_code.unwrap_or(-1)));
            }
            tokio::time::sleep(EXEC_POLL_INTERVAL).await;
        }
    }
}

fn dedup_ports(ports: Vec<u16>) -> Vec<u16> {
    let mut seen = Vec::with_capacity(ports.len());
    for port in ports {
        if !seen.contains(&port) {
            seen.push(port);
        }
    }
    seen
}

fn stamp_time(stamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(stamp).unwrap_or_else(Utc::now)
}

fn exec_env(env: &HashMap<String, String>) -> Vec<String> {
    let mut vars: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
    vars.sort();
    vars
}

/// Split decoded exec output into per-stream text and the combined transcript.
pub(crate) fn collect_exec_output(raw: &[u8], exit_code: i64) -> ExecOutput {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut combined = Vec::new();

    for frame in stream::decode(raw) {
        match frame.stream {
            StreamKind::Stdout => stdout.extend_from_slice(&frame.payload),
            StreamKind::Stderr => stderr.extend_from_slice(&frame.payload),
        }
        combined.extend_from_slice(&frame.payload);
    }

    ExecOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        output: String::from_utf8_lossy(&combined).trim().to_string(),
    }
}

/// Turn a timestamped log stream into entries, dropping lines without a timestamp.
pub(crate) fn parse_log_entries(raw: &[u8]) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    for frame in stream::decode(raw) {
        let text = String::from_utf8_lossy(&frame.payload);
        for line in text.lines().filter(|l| !l.is_empty()) {
            match stream::parse_timestamped(line) {
                Some((timestamp, message)) => entries.push(LogEntry {
                    timestamp,
                    stream: frame.stream,
                    message: message.to_string(),
                }),
                None => tracing::debug!(line, "dropping log line without timestamp"),
            }
        }
    }
    entries
}
