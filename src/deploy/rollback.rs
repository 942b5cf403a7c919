// ABOUTME: Restoring the most recent backup over the deployed directory.
// ABOUTME: Used automatically after a failed run and by the manual rollback command.

use crate::config::DeploymentConfig;
use crate::session::{Connector, RemoteSession};
use crate::types::RemotePath;

use super::backup::{BackupPath, list_backups};
use super::command::RemoteCommand;
use super::error::{ConfigurationSnafu, ConnectionSnafu, DeployError};
use super::events::{DeployEvent, DeployObserver, emit};
use super::transitions::{dir_exists, free_backup_path, reload_service};

use chrono::{DateTime, Utc};
use snafu::ResultExt;

/// What a restore attempt found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The newest backup now sits at the deployed path.
    Restored {
        from: BackupPath,
        /// Where the replaced deployment was kept, if it was kept.
        kept_as: Option<BackupPath>,
        reloaded: bool,
    },
    /// No backups of the deployed path exist.
    NoBackupAvailable,
}

/// Newest backup of `remote_path`, re-listed now.
async fn latest_backup<R: RemoteSession + ?Sized>(
    session: &R,
    remote_path: &RemotePath,
) -> Result<Option<BackupPath>, DeployError> {
    let backups = list_backups(session, remote_path)
        .await
        .map_err(|e| DeployError::Rollback {
            reason: format!("failed to list backups: {}", e),
        })?;
    Ok(backups.into_iter().next())
}

/// Rename `backup` to `remote_path`, then reload if a command is given.
///
/// Returns whether the reload ran and succeeded.
async fn put_back<R: RemoteSession + ?Sized>(
    session: &R,
    backup: &BackupPath,
    remote_path: &RemotePath,
    reload_command: Option<&str>,
) -> Result<bool, DeployError> {
    RemoteCommand::rename(backup, remote_path)
        .run_checked(session)
        .await
        .map_err(|e| DeployError::Rollback {
            reason: format!("failed to restore {}: {}", backup, e),
        })?;

    let Some(command) = reload_command else {
        return Ok(false);
    };
    match reload_service(session, command).await {
        Ok(()) => Ok(true),
        Err(e) => {
            tracing::warn!("Reload after restore failed: {}", e);
            Ok(false)
        }
    }
}

/// Put the newest backup of `remote_path` back in place, discarding the target.
///
/// This:
/// 1. Lists backups and picks the newest
/// 2. Removes whatever currently sits at `remote_path`
/// 3. Renames the backup to `remote_path`
/// 4. Reloads the service, if a command is given
///
/// Only for a target that holds this run's partial upload. A failing
/// reload is logged but does not fail the restore.
///
/// # Errors
///
/// Returns `Rollback` if listing, removal or rename fails.
pub async fn restore_latest<R: RemoteSession + ?Sized>(
    session: &R,
    remote_path: &RemotePath,
    reload_command: Option<&str>,
) -> Result<RollbackOutcome, DeployError> {
    let Some(latest) = latest_backup(session, remote_path).await? else {
        tracing::warn!("No backup of {} to restore", remote_path);
        return Ok(RollbackOutcome::NoBackupAvailable);
    };

    tracing::info!("Restoring {} from {}", remote_path, latest);

    RemoteCommand::remove_all(std::slice::from_ref(remote_path))
        .run_checked(session)
        .await
        .map_err(|e| DeployError::Rollback {
            reason: format!("failed to remove {}: {}", remote_path, e),
        })?;

    let reloaded = put_back(session, &latest, remote_path, reload_command).await?;
    Ok(RollbackOutcome::Restored {
        from: latest,
        kept_as: None,
        reloaded,
    })
}

/// Swap the live deployment with the newest backup.
///
/// The live directory is renamed to a fresh backup name first, so nothing
/// is deleted and a second swap brings it back.
///
/// # Errors
///
/// Returns `Rollback` if listing, either rename, or finding a free backup
/// name fails. If the live directory was already moved aside when the
/// restore fails, it stays under its backup name.
pub async fn swap_with_latest<R: RemoteSession + ?Sized>(
    session: &R,
    remote_path: &RemotePath,
    reload_command: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RollbackOutcome, DeployError> {
    let Some(latest) = latest_backup(session, remote_path).await? else {
        tracing::warn!("No backup of {} to restore", remote_path);
        return Ok(RollbackOutcome::NoBackupAvailable);
    };

    let live = dir_exists(session, RemoteCommand::dir_exists(remote_path))
        .await
        .map_err(|e| DeployError::Rollback {
            reason: format!("failed to check {}: {}", remote_path, e),
        })?;

    let kept_as = if live {
        let aside = free_backup_path(session, remote_path, now)
            .await
            .map_err(|e| DeployError::Rollback {
                reason: format!("failed to move {} aside: {}", remote_path, e),
            })?;
        RemoteCommand::rename(remote_path, &aside)
            .run_checked(session)
            .await
            .map_err(|e| DeployError::Rollback {
                reason: format!("failed to move {} aside: {}", remote_path, e),
            })?;
        tracing::info!("Kept {} as {}", remote_path, aside);
        Some(aside)
    } else {
        None
    };

    tracing::info!("Restoring {} from {}", remote_path, latest);
    let reloaded = put_back(session, &latest, remote_path, reload_command).await?;
    Ok(RollbackOutcome::Restored {
        from: latest,
        kept_as,
        reloaded,
    })
}

/// Single restore attempt after a failed deployment.
///
/// Never returns an error: the outcome is reported through `observer` and
/// the caller keeps the error that triggered the rollback.
pub(crate) async fn auto_rollback<R: RemoteSession + ?Sized>(
    session: &R,
    remote_path: &RemotePath,
    reload_command: Option<&str>,
    cause: &DeployError,
    observer: &dyn DeployObserver,
) {
    tracing::warn!("Rolling back {} after failure", remote_path);
    emit(
        observer,
        DeployEvent::RollbackStarted {
            reason: cause.to_string(),
        },
    );

    match restore_latest(session, remote_path, reload_command).await {
        Ok(RollbackOutcome::Restored { from, reloaded, .. }) => {
            tracing::info!("Rolled back {} to {}", remote_path, from);
            emit(
                observer,
                DeployEvent::RolledBack {
                    restored: from.to_string(),
                    reloaded,
                },
            );
        }
        Ok(RollbackOutcome::NoBackupAvailable) => {
            emit(observer, DeployEvent::RollbackUnavailable);
        }
        Err(e) => {
            tracing::warn!("{}", e);
            emit(
                observer,
                DeployEvent::RollbackFailed {
                    reason: e.to_string(),
                },
            );
        }
    }
}

/// Restore the newest backup on the configured host, keeping the replaced
/// deployment as a backup.
///
/// The session is closed on every path; a failing close is only logged.
///
/// # Errors
///
/// Returns `NoBackupAvailable` if there is nothing to restore, or the
/// configuration, connection or rollback error that stopped the restore.
pub async fn manual_rollback<C: Connector>(
    connector: &C,
    config: &DeploymentConfig,
    observer: &dyn DeployObserver,
) -> Result<BackupPath, DeployError> {
    let resolved = config.validate().context(ConfigurationSnafu)?;
    let session_config = &resolved.session;

    let session = connector
        .connect(session_config)
        .await
        .context(ConnectionSnafu {
            host: session_config.host.clone(),
            port: session_config.port,
        })?;

    let result = swap_with_latest(
        &session,
        &resolved.remote_path,
        resolved.reload_command.as_deref(),
        Utc::now(),
    )
    .await;

    close_session(&session, observer).await;

    match result? {
        RollbackOutcome::Restored {
            from,
            kept_as,
            reloaded,
        } => {
            if let Some(kept) = kept_as {
                emit(
                    observer,
                    DeployEvent::BackupCreated {
                        path: kept.to_string(),
                    },
                );
            }
            emit(
                observer,
                DeployEvent::RolledBack {
                    restored: from.to_string(),
                    reloaded,
                },
            );
            Ok(from)
        }
        RollbackOutcome::NoBackupAvailable => Err(DeployError::NoBackupAvailable {
            remote_path: resolved.remote_path.to_string(),
        }),
    }
}

/// Backups of the configured remote path, newest first.
pub async fn list_remote_backups<C: Connector>(
    connector: &C,
    config: &DeploymentConfig,
    observer: &dyn DeployObserver,
) -> Result<Vec<BackupPath>, DeployError> {
    let resolved = config.validate().context(ConfigurationSnafu)?;
    let session_config = &resolved.session;

    let session = connector
        .connect(session_config)
        .await
        .context(ConnectionSnafu {
            host: session_config.host.clone(),
            port: session_config.port,
        })?;

    let result = list_backups(&session, &resolved.remote_path).await;
    close_session(&session, observer).await;
    result
}

/// Close `session`, reporting a failure as a warning.
pub(crate) async fn close_session<R: RemoteSession + ?Sized>(
    session: &R,
    observer: &dyn DeployObserver,
) {
    if let Err(e) = session.close().await {
        tracing::warn!("SSH disconnect failed: {}", e);
        emit(
            observer,
            DeployEvent::SessionCloseFailed {
                reason: e.to_string(),
            },
        );
    }
}
