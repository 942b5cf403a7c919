// ABOUTME: Error types for deployment operations.
// ABOUTME: One variant per failure class, with a kind for programmatic handling.

use snafu::Snafu;

use crate::config::ConfigError;
use crate::ssh;

/// Errors that can occur while deploying or restoring.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DeployError {
    /// Missing or invalid configuration. Raised before any remote action.
    #[snafu(display("configuration error: {source}"))]
    Configuration { source: ConfigError },

    /// The local build command failed. Raised before any remote action.
    #[snafu(display("local build `{command}` failed: {reason}"))]
    Build { command: String, reason: String },

    /// The remote session could not be established.
    #[snafu(display("failed to connect to {host}:{port}: {source}"))]
    Connection {
        host: String,
        port: u16,
        source: ssh::Error,
    },

    /// A remote command could not run or exited unsuccessfully.
    #[snafu(display("remote command `{command}` failed: {reason}"))]
    RemoteCommand { command: String, reason: String },

    /// The artifact tree could not be transferred.
    #[snafu(display("upload to {remote} failed: {source}"))]
    Upload { remote: String, source: ssh::Error },

    /// The service reload reported an error.
    #[snafu(display("service reload `{command}` failed: {reason}"))]
    Reload { command: String, reason: String },

    /// Old backups could not be removed.
    #[snafu(display("pruning old backups failed: {reason}"))]
    Prune { reason: String },

    /// Restoring a backup failed.
    #[snafu(display("rollback failed: {reason}"))]
    Rollback { reason: String },

    /// Nothing to restore.
    #[snafu(display(
        "no backup of {remote_path} available, manual intervention required"
    ))]
    NoBackupAvailable { remote_path: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Configuration,
    Build,
    Connection,
    RemoteCommand,
    Upload,
    Reload,
    Prune,
    Rollback,
    NoBackupAvailable,
}

impl DeployError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Configuration { .. } => DeployErrorKind::Configuration,
            DeployError::Build { .. } => DeployErrorKind::Build,
            DeployError::Connection { .. } => DeployErrorKind::Connection,
            DeployError::RemoteCommand { .. } => DeployErrorKind::RemoteCommand,
            DeployError::Upload { .. } => DeployErrorKind::Upload,
            DeployError::Reload { .. } => DeployErrorKind::Reload,
            DeployError::Prune { .. } => DeployErrorKind::Prune,
            DeployError::Rollback { .. } => DeployErrorKind::Rollback,
            DeployError::NoBackupAvailable { .. } => DeployErrorKind::NoBackupAvailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = DeployError::Reload {
            command: "systemctl reload nginx".to_string(),
            reason: "unit not found".to_string(),
        };
        assert_eq!(err.kind(), DeployErrorKind::Reload);
        assert_eq!(
            err.to_string(),
            "service reload `systemctl reload nginx` failed: unit not found"
        );
    }

    #[test]
    fn configuration_error_names_the_field() {
        let err = DeployError::Configuration {
            source: ConfigError::MissingField("host"),
        };
        assert_eq!(err.kind(), DeployErrorKind::Configuration);
        assert!(err.to_string().contains("missing required field: host"));
    }
}
