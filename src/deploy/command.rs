// ABOUTME: Builder for the fixed remote shell commands a deployment issues.
// ABOUTME: Accepts only validated path types so nothing needs escaping at call sites.

use std::fmt;

use crate::session::{CommandOutput, RemoteSession};
use crate::types::RemotePath;

use super::backup::BackupPath;
use super::error::DeployError;

/// A path that is safe to splice unquoted into a shell command.
pub trait SafePath {
    fn as_shell(&self) -> &str;
}

impl SafePath for RemotePath {
    fn as_shell(&self) -> &str {
        self.as_str()
    }
}

impl SafePath for BackupPath {
    fn as_shell(&self) -> &str {
        self.as_str()
    }
}

/// A rendered remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand(String);

impl RemoteCommand {
    /// Prints `yes` when `path` is an existing directory.
    pub fn dir_exists(path: &impl SafePath) -> Self {
        Self(format!(
            "if [ -d {} ]; then echo \"yes\"; fi;",
            path.as_shell()
        ))
    }

    pub fn rename(from: &impl SafePath, to: &impl SafePath) -> Self {
        Self(format!("mv {} {}", from.as_shell(), to.as_shell()))
    }

    /// Lists backups of `path`, newest first.
    pub fn list_backups(path: &RemotePath) -> Self {
        Self(format!(
            "ls -1d {}* 2>/dev/null | sort -r",
            path.backup_prefix()
        ))
    }

    pub fn remove_all<P: SafePath>(paths: &[P]) -> Self {
        let targets: Vec<&str> = paths.iter().map(SafePath::as_shell).collect();
        Self(format!("rm -rf {}", targets.join(" ")))
    }

    pub fn make_dir(path: &RemotePath) -> Self {
        Self(format!("mkdir -p {}", path.as_shell()))
    }

    /// The user's reload command, passed through as written.
    pub fn reload(command: &str) -> Self {
        Self(command.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Run the command. Only transport failures are errors.
    pub async fn run<R: RemoteSession + ?Sized>(
        &self,
        session: &R,
    ) -> Result<CommandOutput, DeployError> {
        tracing::debug!("remote: {}", self.0);
        session
            .run(&self.0)
            .await
            .map_err(|e| DeployError::RemoteCommand {
                command: self.0.clone(),
                reason: e.to_string(),
            })
    }

    /// Run the command and treat a non-zero exit status as an error.
    pub async fn run_checked<R: RemoteSession + ?Sized>(
        &self,
        session: &R,
    ) -> Result<CommandOutput, DeployError> {
        let output = self.run(session).await?;
        if !output.success() {
            let stderr = output.stderr.trim();
            return Err(DeployError::RemoteCommand {
                command: self.0.clone(),
                reason: if stderr.is_empty() {
                    format!("exited with status {}", output.exit_code)
                } else {
                    format!("exited with status {}: {}", output.exit_code, stderr)
                },
            });
        }
        Ok(output)
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
