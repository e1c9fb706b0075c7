// ABOUTME: Sandbox data model: container snapshot, status, ports, requests and results.
// ABOUTME: Also derives engine resource names and labels from the owner key.

use crate::runtime::Protocol;
use crate::stream::StreamKind;
use crate::types::{OwnerKey, SandboxId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Fixed prefix of every engine resource name.
pub const NAME_PREFIX: &str = "sandcastle-";

pub const LABEL_MANAGED: &str = "sandcastle.managed";
pub const LABEL_SANDBOX: &str = "sandcastle.sandbox";
pub const LABEL_OWNER: &str = "sandcastle.owner";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Creating,
    Running,
    Stopped,
    Error,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerStatus::Creating => "creating",
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: Protocol,
}

/// Snapshot of a registered sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: SandboxId,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    pub ports: Vec<PortMapping>,
    pub owner_key: OwnerKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Container {
    pub fn host_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().map(|p| p.host_port)
    }

    /// Host mapping published for `container_port`, if any.
    pub fn port(&self, container_port: u16) -> Option<&PortMapping> {
        self.ports
            .iter()
            .find(|p| p.container_port == container_port)
    }

    pub fn volume_name(&self) -> String {
        volume_name(&self.name)
    }
}

/// Parameters for creating a sandbox. Unset fields fall back to settings.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub owner_key: OwnerKey,
    pub image: Option<String>,
    pub ports: Option<Vec<u16>>,
    pub snapshot_id: Option<String>,
}

impl CreateRequest {
    pub fn new(owner_key: OwnerKey) -> Self {
        Self {
            owner_key,
            image: None,
            ports: None,
            snapshot_id: None,
        }
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = Some(ports.into_iter().collect());
        self
    }

    pub fn snapshot_id(mut self, snapshot_id: impl Into<String>) -> Self {
        self.snapshot_id = Some(snapshot_id.into());
        self
    }
}

/// A shell command to run inside a sandbox.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub command: String,
    pub working_dir: Option<String>,
    pub env: HashMap<String, String>,
}

impl ExecRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Result of an exec call. A non-zero exit code is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    /// Both streams in the order they were received, trimmed.
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub stream: StreamKind,
    pub message: String,
}

/// Engine name for a sandbox: `sandcastle-{slug}-{stamp}`.
pub fn engine_name(owner: &OwnerKey, stamp: i64) -> String {
    format!("{NAME_PREFIX}{}-{stamp}", owner.slug())
}

pub fn volume_name(engine_name: &str) -> String {
    format!("{engine_name}-data")
}

/// Labels put on every engine resource that belongs to a sandbox.
pub fn sandbox_labels(
    id: &SandboxId,
    owner: &OwnerKey,
    extra: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut labels = extra.clone();
    labels.insert(LABEL_MANAGED.to_string(), "true".to_string());
    labels.insert(LABEL_SANDBOX.to_string(), id.to_string());
    labels.insert(LABEL_OWNER.to_string(), owner.to_string());
    labels
}
