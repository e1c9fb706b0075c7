// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the init and preview subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sandcastle")]
#[command(about = "Per-session preview sandboxes on Docker and Podman")]
#[command(version)]
pub struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print essential output
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a sandcastle.yml with every default spelled out
    Init {
        /// Default sandbox image
        #[arg(long)]
        image: Option<String>,

        /// Overwrite an existing sandcastle.yml
        #[arg(long)]
        force: bool,
    },

    /// Create and start a sandbox, run commands in it, and watch its events
    Preview {
        /// Owner key (conversation or session id) for the sandbox
        #[arg(long)]
        owner: String,

        /// Image to run instead of the configured one
        #[arg(long)]
        image: Option<String>,

        /// Container port to publish (repeatable; defaults to the configured ports)
        #[arg(long = "port", value_name = "PORT")]
        ports: Vec<u16>,

        /// Shell command to run after start (repeatable, runs in order)
        #[arg(long = "exec", value_name = "CMD")]
        exec: Vec<String>,

        /// Number of log lines to print before tearing down
        #[arg(long, default_value_t = sandcastle::sandbox::DEFAULT_LOG_TAIL)]
        logs: u64,

        /// Snapshot id to record on the sandbox
        #[arg(long)]
        snapshot: Option<String>,
    },
}
