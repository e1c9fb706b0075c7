// ABOUTME: In-memory registry of sandboxes, their engine handles and monitor tasks.
// ABOUTME: One mutex guards all three so a status change and its handle never drift apart.

use super::model::{Container, ContainerStatus};
use crate::types::{ContainerId, OwnerKey, SandboxId};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::task::AbortHandle;

struct Entry {
    container: Container,
    engine_id: ContainerId,
    monitor: Option<AbortHandle>,
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: Mutex<HashMap<SandboxId, Entry>>,
}

impl Registry {
    #[cfg(test)]
    pub fn insert(&self, container: Container, engine_id: ContainerId) {
        self.insert_with(container, engine_id, |_| {});
    }

    /// Insert and run `on_insert` before any other caller can see the entry.
    pub fn insert_with(
        &self,
        container: Container,
        engine_id: ContainerId,
        on_insert: impl FnOnce(&Container),
    ) {
        let mut entries = self.entries.lock();
        on_insert(&container);
        entries.insert(
            container.id.clone(),
            Entry {
                container,
                engine_id,
                monitor: None,
            },
        );
    }

    pub fn get(&self, id: &SandboxId) -> Option<Container> {
        self.entries.lock().get(id).map(|e| e.container.clone())
    }

    /// Run `f` on the current snapshot while the entry is locked.
    ///
    /// Events published from `f` are ordered against every other change
    /// to the same sandbox.
    pub fn with_container<R>(
        &self,
        id: &SandboxId,
        f: impl FnOnce(&Container) -> R,
    ) -> Option<R> {
        self.entries.lock().get(id).map(|e| f(&e.container))
    }

    /// Most recently created sandbox for `owner`.
    pub fn find_by_owner(&self, owner: &OwnerKey) -> Option<Container> {
        self.entries
            .lock()
            .values()
            .filter(|e| &e.container.owner_key == owner)
            .max_by_key(|e| e.container.created_at)
            .map(|e| e.container.clone())
    }

    /// All sandboxes, oldest first.
    pub fn all(&self) -> Vec<Container> {
        let mut all: Vec<_> = self
            .entries
            .lock()
            .values()
            .map(|e| e.container.clone())
            .collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        all
    }

    pub fn engine_handle(&self, id: &SandboxId) -> Option<(ContainerId, ContainerStatus)> {
        self.entries
            .lock()
            .get(id)
            .map(|e| (e.engine_id.clone(), e.container.status))
    }

    /// Move `id` to `to` if its current status is one of `from`.
    ///
    /// Returns the updated snapshot, or None when the entry is gone or in
    /// another state.
    pub fn transition(
        &self,
        id: &SandboxId,
        from: &[ContainerStatus],
        to: ContainerStatus,
    ) -> Option<Container> {
        self.transition_with(id, from, to, |_| {})
    }

    /// [`Registry::transition`], running `on_change` on the new snapshot
    /// before the lock is released.
    pub fn transition_with(
        &self,
        id: &SandboxId,
        from: &[ContainerStatus],
        to: ContainerStatus,
        on_change: impl FnOnce(&Container),
    ) -> Option<Container> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(id)?;
        if !from.contains(&entry.container.status) {
            return None;
        }
        entry.container.status = to;
        entry.container.updated_at = Utc::now();
        on_change(&entry.container);
        Some(entry.container.clone())
    }

    /// Attach a monitor task. It is aborted right away if the sandbox is no
    /// longer running or was removed in the meantime.
    pub fn set_monitor(&self, id: &SandboxId, monitor: AbortHandle) {
        let mut entries = self.entries.lock();
        match entries.get_mut(id) {
            Some(entry) if entry.container.status == ContainerStatus::Running => {
                if let Some(previous) = entry.monitor.replace(monitor) {
                    previous.abort();
                }
            }
            _ => monitor.abort(),
        }
    }

    pub fn abort_monitor(&self, id: &SandboxId) {
        let monitor = self
            .entries
            .lock()
            .get_mut(id)
            .and_then(|e| e.monitor.take());
        if let Some(monitor) = monitor {
            monitor.abort();
        }
    }

    pub fn remove(&self, id: &SandboxId) -> Option<Container> {
        let entry = self.entries.lock().remove(id)?;
        if let Some(monitor) = entry.monitor {
            monitor.abort();
        }
        Some(entry.container)
    }

    pub fn abort_all_monitors(&self) {
        for entry in self.entries.lock().values_mut() {
            if let Some(monitor) = entry.monitor.take() {
                monitor.abort();
            }
        }
    }
}
