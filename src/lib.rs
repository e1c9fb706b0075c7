// ABOUTME: Library root for sandcastle - per-session preview sandboxes on a container engine.
// ABOUTME: The operator binary is in main.rs.

pub mod config;
pub mod error;
pub mod events;
pub mod network;
pub mod output;
pub mod ports;
pub mod runtime;
pub mod sandbox;
pub mod stream;
pub mod types;
pub mod volume;
