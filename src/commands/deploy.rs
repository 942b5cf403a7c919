// ABOUTME: Deploy and upload command implementation.
// ABOUTME: Runs the deployment core against the configured host and reports the outcome.

use hoist::config::DeploymentConfig;
use hoist::deploy::{DeployMode, full_deploy, upload_only};
use hoist::error::Result;
use hoist::output::Output;
use hoist::ssh::SshConnector;

/// Deploy to the configured server.
pub async fn deploy(config: &DeploymentConfig, mode: DeployMode, mut output: Output) -> Result<()> {
    output.start_timer();

    let target = config.host.as_deref().unwrap_or("server");
    output.progress(&format!(
        "Deploying {} to {}",
        config
            .local_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| hoist::config::DEFAULT_LOCAL_PATH.to_string()),
        target
    ));

    let connector = SshConnector;
    let result = match mode {
        DeployMode::Full => full_deploy(&connector, config, &output).await,
        DeployMode::UploadOnly => upload_only(&connector, config, &output).await,
    };

    // Emit collected warnings
    output.flush_warnings();

    let report = result?;
    let message = match &report.backup {
        Some(backup) => format!(
            "Deployed {} file(s) to {} (previous version at {})",
            report.upload.files, report.remote_path, backup
        ),
        None => format!(
            "Deployed {} file(s) to {}",
            report.upload.files, report.remote_path
        ),
    };
    output.success(&message);
    Ok(())
}
