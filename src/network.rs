// ABOUTME: Idempotent provisioning of the shared sandbox bridge network.
// ABOUTME: Concurrent callers share one in-flight lookup-or-create; failures allow retry.

use crate::runtime::{NetworkConfig, NetworkError, NetworkOps};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to initialize network {network}: {message}")]
pub struct NetworkInitError {
    pub network: String,
    pub message: String,
}

type InitFuture = Shared<BoxFuture<'static, Result<(), String>>>;

/// Ensures the bridge network exists before any sandbox is created.
///
/// The first caller starts the lookup-or-create and parks it in `in_flight`;
/// callers arriving while it runs await the same shared future. A failed
/// attempt is dropped from the slot (only if no newer attempt replaced it) so
/// the next call starts over.
pub struct NetworkProvisioner<N> {
    engine: Arc<N>,
    name: String,
    labels: HashMap<String, String>,
    initialized: AtomicBool,
    generation: AtomicU64,
    in_flight: Mutex<Option<(u64, InitFuture)>>,
}

impl<N: NetworkOps + 'static> NetworkProvisioner<N> {
    pub fn new(engine: Arc<N>, name: impl Into<String>, labels: HashMap<String, String>) -> Self {
        Self {
            engine,
            name: name.into(),
            labels,
            initialized: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub async fn ensure_network(&self) -> Result<(), NetworkInitError> {
        if self.is_initialized() {
            return Ok(());
        }

        let (generation, attempt) = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some((generation, attempt)) => (*generation, attempt.clone()),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let attempt = lookup_or_create(
                        Arc::clone(&self.engine),
                        NetworkConfig {
                            name: self.name.clone(),
                            driver: Some("bridge".to_string()),
                            labels: self.labels.clone(),
                        },
                    )
                    .boxed()
                    .shared();
                    *slot = Some((generation, attempt.clone()));
                    (generation, attempt)
                }
            }
        };

        match attempt.await {
            Ok(()) => {
                self.initialized.store(true, Ordering::Release);
                Ok(())
            }
            Err(message) => {
                let mut slot = self.in_flight.lock();
                if slot.as_ref().is_some_and(|(g, _)| *g == generation) {
                    *slot = None;
                }
                Err(NetworkInitError {
                    network: self.name.clone(),
                    message,
                })
            }
        }
    }
}

async fn lookup_or_create<N: NetworkOps>(
    engine: Arc<N>,
    config: NetworkConfig,
) -> Result<(), String> {
    if engine
        .network_exists(&config.name)
        .await
        .map_err(|e| e.to_string())?
    {
        tracing::debug!(network = %config.name, "network already exists");
        return Ok(());
    }

    match engine.create_network(&config).await {
        Ok(id) => {
            tracing::info!(network = %config.name, id = %id, "created network");
            Ok(())
        }
        Err(NetworkError::AlreadyExists(_)) => {
            tracing::debug!(network = %config.name, "network created concurrently");
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}
