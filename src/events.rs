// ABOUTME: Typed lifecycle events and the broadcast bus that carries them.
// ABOUTME: Every event holds a snapshot of the sandbox at the time it was published.

use crate::sandbox::{Container, LogEntry};
use serde::Serialize;
use tokio::sync::broadcast;

pub const DEFAULT_CAPACITY: usize = 256;

/// Lifecycle notification for subscribers.
///
/// Serialized as `{"event": "container-started", "container": {...}, ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum SandboxEvent {
    #[serde(rename = "container-created")]
    Created { container: Container },

    #[serde(rename = "container-started")]
    Started { container: Container },

    #[serde(rename = "container-stopped")]
    Stopped { container: Container },

    #[serde(rename = "container-error")]
    Error { container: Container, message: String },

    #[serde(rename = "port-ready")]
    PortReady {
        container: Container,
        container_port: u16,
        url: String,
    },

    #[serde(rename = "logs")]
    Logs {
        container: Container,
        entries: Vec<LogEntry>,
    },

    #[serde(rename = "container-destroyed")]
    Destroyed { container: Container },
}

impl SandboxEvent {
    pub fn container(&self) -> &Container {
        match self {
            SandboxEvent::Created { container }
            | SandboxEvent::Started { container }
            | SandboxEvent::Stopped { container }
            | SandboxEvent::Error { container, .. }
            | SandboxEvent::PortReady { container, .. }
            | SandboxEvent::Logs { container, .. }
            | SandboxEvent::Destroyed { container } => container,
        }
    }

    /// Wire name of the event, as used in the `event` field.
    pub fn name(&self) -> &'static str {
        match self {
            SandboxEvent::Created { .. } => "container-created",
            SandboxEvent::Started { .. } => "container-started",
            SandboxEvent::Stopped { .. } => "container-stopped",
            SandboxEvent::Error { .. } => "container-error",
            SandboxEvent::PortReady { .. } => "port-ready",
            SandboxEvent::Logs { .. } => "logs",
            SandboxEvent::Destroyed { .. } => "container-destroyed",
        }
    }
}

/// Broadcast channel for [`SandboxEvent`]s.
///
/// Subscribers that fall more than `capacity` events behind miss the oldest
/// ones and see `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SandboxEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: SandboxEvent) {
        tracing::trace!(event = event.name(), id = %event.container().id, "publishing event");
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SandboxEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
