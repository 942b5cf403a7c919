// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state, or itself plus the error for rollback.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};

use crate::session::RemoteSession;
use crate::types::RemotePath;

use super::Deployment;
use super::backup::{BackupPath, backup_path_for, prune_excess};
use super::command::RemoteCommand;
use super::error::DeployError;
use super::events::{DeployEvent, DeployObserver, emit};
use super::rollback::auto_rollback;
use super::state::{Completed, Connected, InFlight, Snapshotted, TargetPrepared, Uploaded};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

/// Attempts at finding an unused backup name before giving up.
const MAX_BACKUP_NAME_ATTEMPTS: i64 = 10;

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Deployment<S> {
    fn transition<T>(self) -> Deployment<T> {
        Deployment {
            config: self.config,
            backup: self.backup,
            pruned: self.pruned,
            upload: self.upload,
            reloaded: self.reloaded,
            _state: PhantomData,
        }
    }
}

impl<S: InFlight> Deployment<S> {
    /// Give up on this run.
    ///
    /// If this run moved a previous deployment aside, it is restored once.
    /// Whatever happens during the restore, `error` is returned unchanged.
    pub async fn abort<R: RemoteSession + ?Sized>(
        self,
        session: &R,
        error: DeployError,
        observer: &dyn DeployObserver,
    ) -> DeployError {
        tracing::error!("Deployment failed: {}", error);

        if self.backup.is_none() {
            tracing::info!("No backup was created by this run, nothing to roll back");
            return error;
        }

        auto_rollback(
            session,
            &self.config.remote_path,
            self.config.reload_command.as_deref(),
            &error,
            observer,
        )
        .await;
        error
    }
}

/// Whether `path` is an existing directory on the remote host.
pub(crate) async fn dir_exists<R: RemoteSession + ?Sized>(
    session: &R,
    command: RemoteCommand,
) -> Result<bool, DeployError> {
    let output = command.run(session).await?;
    Ok(output.stdout.trim() == "yes")
}

/// Run the reload command. Output on stderr counts as failure even with exit status 0.
pub(crate) async fn reload_service<R: RemoteSession + ?Sized>(
    session: &R,
    command: &str,
) -> Result<(), DeployError> {
    let reload = RemoteCommand::reload(command);
    let output = session
        .run(reload.as_str())
        .await
        .map_err(|e| DeployError::Reload {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        return Err(DeployError::Reload {
            command: command.to_string(),
            reason: stderr.to_string(),
        });
    }
    if !output.success() {
        return Err(DeployError::Reload {
            command: command.to_string(),
            reason: format!("exited with status {}", output.exit_code),
        });
    }
    Ok(())
}

/// First backup name for `remote_path` at or after `now` that is not taken yet.
///
/// Two runs within the same second would otherwise collide, so the
/// timestamp is advanced a second at a time.
pub(crate) async fn free_backup_path<R: RemoteSession + ?Sized>(
    session: &R,
    remote_path: &RemotePath,
    now: DateTime<Utc>,
) -> Result<BackupPath, DeployError> {
    let mut last = None;
    for offset in 0..MAX_BACKUP_NAME_ATTEMPTS {
        let candidate = backup_path_for(remote_path, now + chrono::Duration::seconds(offset));
        let check = RemoteCommand::dir_exists(&candidate);
        if !dir_exists(session, check.clone()).await? {
            return Ok(candidate);
        }
        tracing::debug!("Backup name {} already taken", candidate);
        last = Some(check);
    }

    Err(DeployError::RemoteCommand {
        command: last.map(|c| c.to_string()).unwrap_or_default(),
        reason: format!(
            "no free backup name after {} attempts",
            MAX_BACKUP_NAME_ATTEMPTS
        ),
    })
}

// =============================================================================
// Connected -> Snapshotted
// =============================================================================

impl Deployment<Connected> {
    /// Move an existing deployment aside and prune old backups.
    ///
    /// Pruning failures are reported to the observer and otherwise ignored.
    #[must_use = "deployment state must be used"]
    pub async fn snapshot<R: RemoteSession + ?Sized>(
        mut self,
        session: &R,
        observer: &dyn DeployObserver,
    ) -> TransitionResult<Snapshotted, Connected> {
        match self.snapshot_inner(session, observer, Utc::now()).await {
            Ok(()) => Ok(self.transition()),
            Err(e) => Err((self, e)),
        }
    }

    async fn snapshot_inner<R: RemoteSession + ?Sized>(
        &mut self,
        session: &R,
        observer: &dyn DeployObserver,
        now: DateTime<Utc>,
    ) -> Result<(), DeployError> {
        let remote_path = self.config.remote_path.clone();

        if !dir_exists(session, RemoteCommand::dir_exists(&remote_path)).await? {
            tracing::info!("No existing deployment at {}, skipping backup", remote_path);
            emit(observer, DeployEvent::NoExistingDeployment);
            return Ok(());
        }

        let backup = free_backup_path(session, &remote_path, now).await?;
        RemoteCommand::rename(&remote_path, &backup)
            .run_checked(session)
            .await?;
        self.backup = Some(backup.clone());

        tracing::info!("Backed up {} to {}", remote_path, backup);
        emit(
            observer,
            DeployEvent::BackupCreated {
                path: backup.to_string(),
            },
        );

        if self.config.backup_keep.is_none() {
            return Ok(());
        }

        match prune_excess(session, &remote_path, self.config.backup_keep, Some(&backup)).await {
            Ok(removed) => {
                if !removed.is_empty() {
                    emit(
                        observer,
                        DeployEvent::BackupsPruned {
                            removed: removed.iter().map(ToString::to_string).collect(),
                        },
                    );
                }
                self.pruned = removed;
            }
            Err(e) => {
                tracing::warn!("{}", e);
                emit(
                    observer,
                    DeployEvent::PruneFailed {
                        reason: e.to_string(),
                    },
                );
            }
        }

        Ok(())
    }
}

// =============================================================================
// Snapshotted -> TargetPrepared
// =============================================================================

impl Deployment<Snapshotted> {
    /// Create the (empty) target directory.
    #[must_use = "deployment state must be used"]
    pub async fn prepare_target<R: RemoteSession + ?Sized>(
        self,
        session: &R,
        observer: &dyn DeployObserver,
    ) -> TransitionResult<TargetPrepared, Snapshotted> {
        let command = RemoteCommand::make_dir(&self.config.remote_path);
        if let Err(e) = command.run_checked(session).await {
            return Err((self, e));
        }

        emit(
            observer,
            DeployEvent::TargetPrepared {
                path: self.config.remote_path.to_string(),
            },
        );
        Ok(self.transition())
    }
}

// =============================================================================
// TargetPrepared -> Uploaded
// =============================================================================

impl Deployment<TargetPrepared> {
    /// Transfer the local artifact tree into the target directory.
    #[must_use = "deployment state must be used"]
    pub async fn upload<R: RemoteSession + ?Sized>(
        mut self,
        session: &R,
        observer: &dyn DeployObserver,
    ) -> TransitionResult<Uploaded, TargetPrepared> {
        tracing::info!(
            "Uploading {} to {}",
            self.config.local_path.display(),
            self.config.remote_path
        );

        let result = session
            .upload_tree(
                &self.config.local_path,
                self.config.remote_path.as_str(),
                self.config.upload,
            )
            .await;

        match result {
            Ok(summary) => {
                emit(
                    observer,
                    DeployEvent::Uploaded {
                        files: summary.files,
                        bytes: summary.bytes,
                    },
                );
                self.upload = summary;
                Ok(self.transition())
            }
            Err(source) => {
                let remote = self.config.remote_path.to_string();
                Err((self, DeployError::Upload { remote, source }))
            }
        }
    }
}

// =============================================================================
// Uploaded -> Completed
// =============================================================================

impl Deployment<Uploaded> {
    /// Reload the dependent service, if configured.
    #[must_use = "deployment state must be used"]
    pub async fn reload<R: RemoteSession + ?Sized>(
        mut self,
        session: &R,
        observer: &dyn DeployObserver,
    ) -> TransitionResult<Completed, Uploaded> {
        let Some(command) = self.config.reload_command.clone() else {
            return Ok(self.transition());
        };

        match reload_service(session, &command).await {
            Ok(()) => {
                emit(observer, DeployEvent::ServiceReloaded);
                self.reloaded = true;
                Ok(self.transition())
            }
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Completed - Terminal State
// =============================================================================

/// Summary of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub remote_path: RemotePath,
    /// Where the previous deployment was moved, if there was one.
    pub backup: Option<BackupPath>,
    pub pruned: Vec<BackupPath>,
    pub upload: crate::session::UploadSummary,
    pub reloaded: bool,
}

impl Deployment<Completed> {
    /// Consume the deployment and summarize it.
    pub fn finish(self) -> DeployReport {
        DeployReport {
            remote_path: self.config.remote_path,
            backup: self.backup,
            pruned: self.pruned,
            upload: self.upload,
            reloaded: self.reloaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentConfig;
    use crate::deploy::events::SilentObserver;
    use crate::session::{CommandOutput, UploadOptions, UploadSummary};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::Path;

    /// Answers commands from a fixed table and records what it ran.
    #[derive(Default)]
    struct Scripted {
        replies: HashMap<String, CommandOutput>,
        log: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn reply(mut self, command: &str, stdout: &str, stderr: &str, exit_code: u32) -> Self {
            self.replies.insert(
                command.to_string(),
                CommandOutput {
                    exit_code,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
            );
            self
        }
    }

    #[async_trait]
    impl RemoteSession for Scripted {
        async fn run(&self, command: &str) -> crate::ssh::Result<CommandOutput> {
            self.log.lock().push(command.to_string());
            Ok(self.replies.get(command).cloned().unwrap_or_default())
        }

        async fn upload_tree(
            &self,
            _local_dir: &Path,
            _remote_dir: &str,
            _options: UploadOptions,
        ) -> crate::ssh::Result<UploadSummary> {
            Ok(UploadSummary::default())
        }

        async fn close(&self) -> crate::ssh::Result<()> {
            Ok(())
        }
    }

    fn deployment() -> Deployment<Connected> {
        let config = DeploymentConfig {
            host: Some("example.com".to_string()),
            username: Some("deploy".to_string()),
            remote_path: Some("/var/www/app".to_string()),
            ..Default::default()
        };
        Deployment::new(config.validate().unwrap())
    }

    const EXISTS: &str = r#"if [ -d /var/www/app ]; then echo "yes"; fi;"#;

    fn exists_at(stamp: &str) -> String {
        format!(r#"if [ -d /var/www/app_backup_{stamp} ]; then echo "yes"; fi;"#)
    }

    #[tokio::test]
    async fn taken_backup_name_advances_one_second() {
        let session = Scripted::default()
            .reply(EXISTS, "yes\n", "", 0)
            .reply(&exists_at("20240101120000"), "yes\n", "", 0);
        let mut deployment = deployment();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        deployment
            .snapshot_inner(&session, &SilentObserver, now)
            .await
            .unwrap();

        assert_eq!(
            deployment.backup().map(BackupPath::as_str),
            Some("/var/www/app_backup_20240101120001")
        );
        assert!(
            session
                .log
                .lock()
                .contains(&"mv /var/www/app /var/www/app_backup_20240101120001".to_string())
        );
    }

    #[tokio::test]
    async fn missing_target_skips_backup() {
        let session = Scripted::default();
        let mut deployment = deployment();

        deployment
            .snapshot_inner(&session, &SilentObserver, Utc::now())
            .await
            .unwrap();

        assert!(deployment.backup().is_none());
        assert_eq!(session.log.lock().as_slice(), &[EXISTS.to_string()]);
    }

    #[tokio::test]
    async fn reload_with_stderr_fails_despite_zero_exit() {
        let session = Scripted::default().reply("systemctl reload nginx", "", "unit not found\n", 0);
        let err = reload_service(&session, "systemctl reload nginx")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "service reload `systemctl reload nginx` failed: unit not found"
        );
    }

    #[tokio::test]
    async fn reload_with_nonzero_exit_fails() {
        let session = Scripted::default().reply("systemctl reload nginx", "", "", 1);
        assert!(reload_service(&session, "systemctl reload nginx").await.is_err());
    }
}
