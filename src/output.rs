// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes for events, exec and logs.

use crate::events::SandboxEvent;
use crate::sandbox::{ExecOutput, LogEntry};
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.json_status("success", message),
        }
    }

    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.json_status("warning", message),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&self.status_line("error", message)) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a lifecycle event as it arrives.
    pub fn event(&self, event: &SandboxEvent) {
        match self.mode {
            OutputMode::Json => print_json(event),
            OutputMode::Quiet => {
                if let SandboxEvent::PortReady { url, .. } = event {
                    println!("{url}");
                }
            }
            OutputMode::Normal => println!("  • {}", describe_event(event)),
        }
    }

    pub fn exec_result(&self, command: &str, result: &ExecOutput) {
        match self.mode {
            OutputMode::Json => {
                #[derive(Serialize)]
                struct ExecLine<'a> {
                    event: &'static str,
                    command: &'a str,
                    #[serde(flatten)]
                    result: &'a ExecOutput,
                }
                print_json(&ExecLine {
                    event: "exec",
                    command,
                    result,
                });
            }
            OutputMode::Quiet => {
                if !result.output.is_empty() {
                    println!("{}", result.output);
                }
            }
            OutputMode::Normal => {
                println!("  $ {command}");
                for line in result.output.lines() {
                    println!("    {line}");
                }
                if !result.success() {
                    println!("  ✗ exited with {}", result.exit_code);
                }
            }
        }
    }

    pub fn logs(&self, entries: &[LogEntry]) {
        for entry in entries {
            match self.mode {
                OutputMode::Json => print_json(entry),
                OutputMode::Quiet | OutputMode::Normal => println!(
                    "{} {:<6} {}",
                    entry.timestamp.to_rfc3339(),
                    entry.stream,
                    entry.message
                ),
            }
        }
    }

    fn json_status(&self, event: &str, message: &str) {
        print_json(&self.status_line(event, message));
    }

    fn status_line<'a>(&self, event: &'a str, message: &'a str) -> JsonEvent<'a> {
        JsonEvent {
            event,
            message,
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        }
    }
}

fn describe_event(event: &SandboxEvent) -> String {
    let container = event.container();
    match event {
        SandboxEvent::Created { .. } => format!("created {} ({})", container.id, container.name),
        SandboxEvent::Started { .. } => format!("started {}", container.id),
        SandboxEvent::Stopped { .. } => format!("stopped {}", container.id),
        SandboxEvent::Error { message, .. } => format!("error on {}: {message}", container.id),
        SandboxEvent::PortReady {
            container_port,
            url,
            ..
        } => match container.port(*container_port) {
            Some(mapping) => format!(
                "port {container_port} ready at {url} (host port {})",
                mapping.host_port
            ),
            None => format!("port {container_port} ready at {url}"),
        },
        SandboxEvent::Logs { entries, .. } => format!("{} log lines", entries.len()),
        SandboxEvent::Destroyed { .. } => format!("destroyed {}", container.id),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
