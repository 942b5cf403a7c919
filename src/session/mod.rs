// ABOUTME: Remote session capabilities the deployment core depends on.
// ABOUTME: Defines the RemoteSession and Connector traits plus shared command/transfer types.

use async_trait::async_trait;
use std::path::Path;

use crate::ssh::{Result, SessionConfig};

/// Default number of files transferred in parallel during a tree upload.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 10;

/// Output from a remote command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Options for a recursive tree upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Maximum number of files in flight at once.
    pub concurrency: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }
}

/// What a tree upload transferred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

/// An open channel to one remote host.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run a shell command and capture its output.
    ///
    /// A non-zero exit status is not an error at this layer; callers decide
    /// how to interpret `exit_code` and `stderr`.
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Recursively copy `local_dir` into the existing `remote_dir`.
    ///
    /// Returns after every file has been written or on the first failure.
    async fn upload_tree(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        options: UploadOptions,
    ) -> Result<UploadSummary>;

    /// Tear the session down. Calling this more than once is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Opens remote sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: RemoteSession;

    async fn connect(&self, config: &SessionConfig) -> Result<Self::Session>;
}
