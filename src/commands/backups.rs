// ABOUTME: Backups command implementation.
// ABOUTME: Lists backups of the deployed directory, newest first.

use hoist::config::DeploymentConfig;
use hoist::deploy::{BackupPath, list_remote_backups};
use hoist::error::Result;
use hoist::output::{Output, OutputMode};
use hoist::ssh::SshConnector;
use serde::Serialize;

#[derive(Serialize)]
struct BackupEntry<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

/// List backups on the configured server.
pub async fn backups(config: &DeploymentConfig, output: Output) -> Result<()> {
    let result = list_remote_backups(&SshConnector, config, &output).await;
    output.flush_warnings();
    let backups = result?;

    if output.mode() == OutputMode::Json {
        for backup in &backups {
            if let Ok(json) = serde_json::to_string(&entry(backup)) {
                println!("{json}");
            }
        }
        return Ok(());
    }

    if backups.is_empty() {
        output.success("No backups found");
        return Ok(());
    }

    for backup in &backups {
        match backup.created_at() {
            Some(at) => println!("{}  {}", backup, at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("{}", backup),
        }
    }
    Ok(())
}

fn entry(backup: &BackupPath) -> BackupEntry<'_> {
    BackupEntry {
        path: backup.as_str(),
        created_at: backup.created_at().map(|at| at.to_rfc3339()),
    }
}
