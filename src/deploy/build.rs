// ABOUTME: Local build step run before a full deployment.
// ABOUTME: Executes the configured build command through `sh -c` in the working directory.

use std::process::Stdio;
use tokio::process::Command;

use super::error::DeployError;

/// Lines of build stderr kept in the error message.
const STDERR_TAIL_LINES: usize = 20;

/// Run `command` and wait for it to finish.
///
/// # Errors
///
/// Returns `Build` if the command cannot be spawned or exits unsuccessfully.
pub async fn run_local_build(command: &str) -> Result<(), DeployError> {
    tracing::info!("Running build: {}", command);

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DeployError::Build {
            command: command.to_string(),
            reason: format!("failed to start: {}", e),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        tracing::debug!(target: "hoist::build", "{}", line);
    }

    if output.status.success() {
        tracing::info!("Build completed successfully");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail = tail_lines(&stderr, STDERR_TAIL_LINES);
    let status = match output.status.code() {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_string(),
    };

    Err(DeployError::Build {
        command: command.to_string(),
        reason: if tail.is_empty() {
            status
        } else {
            format!("{}: {}", status, tail)
        },
    })
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
