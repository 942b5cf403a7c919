// ABOUTME: Rollback command implementation.
// ABOUTME: Restores the newest backup over the deployed directory on the configured host.

use hoist::config::DeploymentConfig;
use hoist::deploy::manual_rollback;
use hoist::error::Result;
use hoist::output::Output;
use hoist::ssh::SshConnector;

/// Rollback to the previous deployment on the configured server.
pub async fn rollback(config: &DeploymentConfig, mut output: Output) -> Result<()> {
    output.start_timer();

    output.progress(&format!(
        "Rolling back {} on {}",
        config.remote_path.as_deref().unwrap_or("deployment"),
        config.host.as_deref().unwrap_or("server")
    ));

    let result = manual_rollback(&SshConnector, config, &output).await;

    // Emit collected warnings
    output.flush_warnings();

    let restored = result?;
    output.success(&format!("Rollback complete! Restored {}", restored));
    Ok(())
}
