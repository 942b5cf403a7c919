// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes, and renders deployment events.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;

use crate::deploy::{DeployEvent, DeployObserver};
use crate::diagnostics::{Diagnostics, Warning};

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
    diagnostics: Mutex<Diagnostics>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
            diagnostics: Mutex::new(Diagnostics::default()),
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
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => self.print_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => self.print_json(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print the warnings collected so far and clear them.
    ///
    /// In JSON mode warnings already went out as events.
    pub fn flush_warnings(&self) {
        let warnings = self.diagnostics.lock().take();
        if self.mode == OutputMode::Json {
            return;
        }
        for warning in &warnings {
            self.warning(&warning.message);
        }
    }

    /// Warnings collected from observed events.
    pub fn warnings(&self) -> Vec<Warning> {
        self.diagnostics.lock().warnings().to_vec()
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    fn print_json<T: Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string(value) {
            println!("{json}");
        }
    }
}

impl DeployObserver for Output {
    fn on_event(&self, event: &DeployEvent) {
        self.diagnostics.lock().observe(event);

        if self.mode == OutputMode::Json {
            self.print_json(event);
            return;
        }

        if let Some(line) = progress_line(event) {
            self.progress(&line);
        }
    }
}

/// Human-readable progress line for `event`.
///
/// Warnings and the terminal events are printed elsewhere.
fn progress_line(event: &DeployEvent) -> Option<String> {
    let line = match event {
        DeployEvent::StepStarted { index, total, step } => {
            format!("[{}/{}] {}...", index, total, step)
        }
        DeployEvent::NoExistingDeployment => "  → No existing deployment, skipping backup".into(),
        DeployEvent::BackupCreated { path } => format!("  → Backed up to {}", path),
        DeployEvent::BackupsPruned { removed } => {
            format!("  → Removed {} old backup(s)", removed.len())
        }
        DeployEvent::TargetPrepared { path } => format!("  → Created {}", path),
        DeployEvent::Uploaded { files, bytes } => {
            format!("  → Uploaded {} file(s), {} bytes", files, bytes)
        }
        DeployEvent::ServiceReloaded => "  ✓ Service reloaded".into(),
        DeployEvent::RollbackStarted { .. } => "  → Rolling back...".into(),
        DeployEvent::RolledBack { restored, reloaded } => {
            if *reloaded {
                format!("  ✓ Restored {} and reloaded", restored)
            } else {
                format!("  ✓ Restored {}", restored)
            }
        }
        _ => return None,
    };
    Some(line)
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
