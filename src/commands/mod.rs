// ABOUTME: Command module aggregator for the sandcastle CLI.
// ABOUTME: Re-exports the preview command handler.

mod preview;
mod runtime_connection;

pub use preview::{PreviewArgs, preview};
