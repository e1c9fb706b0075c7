// ABOUTME: Host port allocation for published sandbox ports.
// ABOUTME: Probes candidates with transient listeners and tracks in-process reservations.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::{IpAddr, TcpListener};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no free host port found starting at {start} after {attempts} attempts")]
pub struct PortAllocationError {
    pub start: u16,
    pub attempts: u32,
}

/// Finds free host ports by binding and immediately closing a listener.
///
/// The probe socket is closed before the engine binds the port, so another
/// process can still grab it in between. Ports handed out here are reserved
/// in-process until [`PortAllocator::release`], which keeps concurrent
/// sandboxes of this process from ever sharing a host port.
#[derive(Debug)]
pub struct PortAllocator {
    bind_host: IpAddr,
    max_attempts: u32,
    reserved: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new(bind_host: IpAddr, max_attempts: u32) -> Self {
        Self {
            bind_host,
            max_attempts,
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve the first bindable port at or above `preferred_start`.
    pub fn allocate(&self, preferred_start: u16) -> Result<u16, PortAllocationError> {
        let start = preferred_start.max(1);
        let mut reserved = self.reserved.lock();
        let mut attempts = 0;
        let mut candidate = start;

        while attempts < self.max_attempts {
            attempts += 1;

            if !reserved.contains(&candidate) {
                match self.probe(candidate) {
                    Ok(port) => {
                        reserved.insert(port);
                        tracing::debug!(port, attempts, "allocated host port");
                        return Ok(port);
                    }
                    Err(e) => tracing::debug!(port = candidate, error = %e, "port busy"),
                }
            }

            match candidate.checked_add(1) {
                Some(next) => candidate = next,
                None => break,
            }
        }

        Err(PortAllocationError { start, attempts })
    }

    /// Return ports to the pool.
    pub fn release(&self, ports: impl IntoIterator<Item = u16>) {
        let mut reserved = self.reserved.lock();
        for port in ports {
            reserved.remove(&port);
        }
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.reserved.lock().contains(&port)
    }

    fn probe(&self, port: u16) -> std::io::Result<u16> {
        let listener = TcpListener::bind((self.bind_host, port))?;
        listener.local_addr().map(|addr| addr.port())
    }
}
