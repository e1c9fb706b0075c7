// ABOUTME: Test support utilities.
// ABOUTME: Provides the fake engine, fast test settings, and event helpers.

use sandcastle::events::SandboxEvent;
use sandcastle::sandbox::{LifecycleManager, SandboxSettings};
use sandcastle::types::OwnerKey;
use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::sync::Once;
use std::time::Duration;
use tokio::sync::broadcast;

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod fake_engine;

use fake_engine::FakeEngine;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("sandcastle=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Settings with loopback binding and a readiness budget measured in milliseconds.
#[allow(dead_code)]
pub fn test_settings() -> SandboxSettings {
    let mut settings = SandboxSettings::default();
    settings.bind_host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    settings.port_search_start = Some(ephemeral_port());
    settings.readiness.host = "127.0.0.1".to_string();
    settings.readiness.attempts = 3;
    settings.readiness.interval = Duration::from_millis(10);
    settings.readiness.timeout = Duration::from_millis(200);
    settings
}

#[allow(dead_code)]
pub fn manager() -> LifecycleManager<FakeEngine> {
    init_tracing();
    LifecycleManager::new(FakeEngine::new(), test_settings())
}

#[allow(dead_code)]
pub fn owner(key: &str) -> OwnerKey {
    OwnerKey::new(key).unwrap()
}

/// A port the OS considers free right now, used to spread tests apart.
#[allow(dead_code)]
pub fn ephemeral_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Next event, failing the test if none arrives within a second.
#[allow(dead_code)]
pub async fn next_event(rx: &mut broadcast::Receiver<SandboxEvent>) -> SandboxEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Skip events until one named `name` arrives.
#[allow(dead_code)]
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<SandboxEvent>,
    name: &str,
) -> SandboxEvent {
    loop {
        let event = next_event(rx).await;
        if event.name() == name {
            return event;
        }
    }
}

/// Events already queued on `rx`, without waiting.
#[allow(dead_code)]
pub fn drain_events(rx: &mut broadcast::Receiver<SandboxEvent>) -> Vec<SandboxEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
