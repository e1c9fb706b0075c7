// ABOUTME: In-memory container engine implementing every capability trait.
// ABOUTME: Counts calls, injects failures, and lets tests simulate container exits.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sandcastle::runtime::{
    ContainerConfig, ContainerError, ContainerOps, ExecConfig, ExecError, ExecInfo, ExecOps,
    LogError, LogOps, LogOptions, NetworkConfig, NetworkError, NetworkOps, VolumeConfig,
    VolumeError, VolumeOps,
};
use sandcastle::types::{ContainerId, ExecId, NetworkId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Engine operations that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    NetworkExists,
    NetworkCreate,
    VolumeCreate,
    VolumeRemove,
    ContainerCreate,
    ContainerStart,
    ContainerStop,
    ContainerRemove,
    ExecCreate,
    Logs,
}

struct FakeContainer {
    config: ContainerConfig,
    running: bool,
    exit: watch::Sender<Option<i64>>,
}

struct ExecScript {
    output: Bytes,
    exit_code: Option<i64>,
    delay: Duration,
}

#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<HashMap<Op, usize>>,
    failures: Mutex<HashMap<Op, String>>,
    sticky_failures: Mutex<HashMap<Op, String>>,
    network_create_delay: Mutex<Duration>,
    networks: Mutex<HashSet<String>>,
    volumes: Mutex<HashSet<String>>,
    containers: Mutex<HashMap<String, FakeContainer>>,
    execs: Mutex<HashMap<String, ExecConfig>>,
    last_exec: Mutex<Option<ExecConfig>>,
    exec_script: Mutex<Option<ExecScript>>,
    exec_running_inspects: AtomicUsize,
    exec_inspections: AtomicUsize,
    log_output: Mutex<Bytes>,
    last_log_options: Mutex<Option<LogOptions>>,
    next_id: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call of `op` with a runtime error carrying `message`.
    pub fn fail_next(&self, op: Op, message: &str) {
        self.failures.lock().insert(op, message.to_string());
    }

    /// Fail every call of `op` until [`FakeEngine::clear_failures`].
    pub fn fail_always(&self, op: Op, message: &str) {
        self.sticky_failures.lock().insert(op, message.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
        self.sticky_failures.lock().clear();
    }

    pub fn set_network_create_delay(&self, delay: Duration) {
        *self.network_create_delay.lock() = delay;
    }

    pub fn add_network(&self, name: &str) {
        self.networks.lock().insert(name.to_string());
    }

    pub fn set_exec_output(&self, output: Vec<u8>, exit_code: Option<i64>) {
        *self.exec_script.lock() = Some(ExecScript {
            output: Bytes::from(output),
            exit_code,
            delay: Duration::ZERO,
        });
    }

    pub fn set_exec_delay(&self, delay: Duration) {
        let mut script = self.exec_script.lock();
        let script = script.get_or_insert_with(|| ExecScript {
            output: Bytes::new(),
            exit_code: Some(0),
            delay: Duration::ZERO,
        });
        script.delay = delay;
    }

    /// Report the next `count` exec inspections as still running with no exit code.
    pub fn set_exec_running_inspects(&self, count: usize) {
        self.exec_running_inspects.store(count, Ordering::SeqCst);
    }

    pub fn exec_inspections(&self) -> usize {
        self.exec_inspections.load(Ordering::SeqCst)
    }

    pub fn set_log_output(&self, output: Vec<u8>) {
        *self.log_output.lock() = Bytes::from(output);
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.networks.lock().contains(name)
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.volumes.lock().contains(name)
    }

    pub fn container_count(&self) -> usize {
        self.containers.lock().len()
    }

    /// Engine-side config of the container created under `name`.
    pub fn container_config(&self, name: &str) -> Option<ContainerConfig> {
        self.containers
            .lock()
            .values()
            .find(|c| c.config.name == name)
            .map(|c| c.config.clone())
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.containers
            .lock()
            .values()
            .any(|c| c.config.name == name && c.running)
    }

    /// Make the container named `name` exit on its own with `code`.
    pub fn exit_container(&self, name: &str, code: i64) {
        let mut containers = self.containers.lock();
        if let Some(c) = containers.values_mut().find(|c| c.config.name == name) {
            c.running = false;
            c.exit.send_replace(Some(code));
        }
    }

    pub fn last_exec_config(&self) -> Option<ExecConfig> {
        self.last_exec.lock().clone()
    }

    pub fn last_log_options(&self) -> Option<LogOptions> {
        self.last_log_options.lock().clone()
    }

    fn record(&self, op: Op) -> Option<String> {
        *self.calls.lock().entry(op).or_default() += 1;
        if let Some(message) = self.sticky_failures.lock().get(&op) {
            return Some(message.clone());
        }
        self.failures.lock().remove(&op)
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl NetworkOps for FakeEngine {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let delay = *self.network_create_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.record(Op::NetworkCreate) {
            return Err(NetworkError::Runtime(message));
        }
        if !self.networks.lock().insert(config.name.clone()) {
            return Err(NetworkError::AlreadyExists(config.name.clone()));
        }
        Ok(NetworkId::new(self.next_id("net")))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        if let Some(message) = self.record(Op::NetworkExists) {
            return Err(NetworkError::Runtime(message));
        }
        Ok(self.networks.lock().contains(name))
    }
}

#[async_trait]
impl VolumeOps for FakeEngine {
    async fn create_volume(&self, config: &VolumeConfig) -> Result<(), VolumeError> {
        if let Some(message) = self.record(Op::VolumeCreate) {
            return Err(VolumeError::Runtime(message));
        }
        if !self.volumes.lock().insert(config.name.clone()) {
            return Err(VolumeError::AlreadyExists(config.name.clone()));
        }
        Ok(())
    }

    async fn remove_volume(&self, name: &str, _force: bool) -> Result<(), VolumeError> {
        if let Some(message) = self.record(Op::VolumeRemove) {
            return Err(VolumeError::Runtime(message));
        }
        if !self.volumes.lock().remove(name) {
            return Err(VolumeError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerOps for FakeEngine {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        if let Some(message) = self.record(Op::ContainerCreate) {
            return Err(ContainerError::Runtime(message));
        }
        let mut containers = self.containers.lock();
        if containers.values().any(|c| c.config.name == config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }
        let id = self.next_id("ctr");
        let (exit, _) = watch::channel(None);
        containers.insert(
            id.clone(),
            FakeContainer {
                config: config.clone(),
                running: false,
                exit,
            },
        );
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        if let Some(message) = self.record(Op::ContainerStart) {
            return Err(ContainerError::Runtime(message));
        }
        let mut containers = self.containers.lock();
        let c = containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        c.running = true;
        c.exit.send_replace(None);
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        if let Some(message) = self.record(Op::ContainerStop) {
            return Err(ContainerError::Runtime(message));
        }
        let mut containers = self.containers.lock();
        let c = containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if !c.running {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        c.running = false;
        c.exit.send_replace(Some(143));
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        if let Some(message) = self.record(Op::ContainerRemove) {
            return Err(ContainerError::Runtime(message));
        }
        let mut containers = self.containers.lock();
        match containers.get(id.as_str()) {
            None => Err(ContainerError::NotFound(id.to_string())),
            Some(c) if c.running && !force => Err(ContainerError::AlreadyRunning(id.to_string())),
            Some(_) => {
                containers.remove(id.as_str());
                Ok(())
            }
        }
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let mut exit = self
            .containers
            .lock()
            .get(id.as_str())
            .map(|c| c.exit.subscribe())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;

        loop {
            if let Some(code) = *exit.borrow_and_update() {
                return Ok(code);
            }
            if exit.changed().await.is_err() {
                return Err(ContainerError::NotFound(id.to_string()));
            }
        }
    }
}

#[async_trait]
impl ExecOps for FakeEngine {
    async fn exec_create(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecId, ExecError> {
        if let Some(message) = self.record(Op::ExecCreate) {
            return Err(ExecError::Runtime(message));
        }
        match self.containers.lock().get(container.as_str()) {
            None => return Err(ExecError::ContainerNotFound(container.to_string())),
            Some(c) if !c.running => {
                return Err(ExecError::ContainerNotRunning(container.to_string()));
            }
            Some(_) => {}
        }
        let id = self.next_id("exec");
        self.execs.lock().insert(id.clone(), config.clone());
        *self.last_exec.lock() = Some(config.clone());
        Ok(ExecId::new(id))
    }

    async fn exec_start(&self, exec_id: &ExecId) -> Result<Bytes, ExecError> {
        if !self.execs.lock().contains_key(exec_id.as_str()) {
            return Err(ExecError::ExecNotFound(exec_id.to_string()));
        }
        let (output, delay) = match self.exec_script.lock().as_ref() {
            Some(script) => (script.output.clone(), script.delay),
            None => (Bytes::new(), Duration::ZERO),
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(output)
    }

    async fn exec_inspect(&self, exec_id: &ExecId) -> Result<ExecInfo, ExecError> {
        if !self.execs.lock().contains_key(exec_id.as_str()) {
            return Err(ExecError::ExecNotFound(exec_id.to_string()));
        }
        self.exec_inspections.fetch_add(1, Ordering::SeqCst);
        let still_running = self
            .exec_running_inspects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if still_running {
            return Ok(ExecInfo {
                running: true,
                exit_code: None,
            });
        }
        let exit_code = match self.exec_script.lock().as_ref() {
            Some(script) => script.exit_code,
            None => Some(0),
        };
        Ok(ExecInfo {
            running: false,
            exit_code,
        })
    }
}

#[async_trait]
impl LogOps for FakeEngine {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Bytes, LogError> {
        if let Some(message) = self.record(Op::Logs) {
            return Err(LogError::Runtime(message));
        }
        if !self.containers.lock().contains_key(id.as_str()) {
            return Err(LogError::ContainerNotFound(id.to_string()));
        }
        *self.last_log_options.lock() = Some(opts.clone());
        Ok(self.log_output.lock().clone())
    }
}
