// ABOUTME: SSH client module for remote server connections.
// ABOUTME: Implements the remote session traits on top of russh.

mod client;
mod error;
mod upload;

pub use client::{Auth, Session, SessionConfig};
pub use error::{Error, Result};

use async_trait::async_trait;
use std::path::Path;

use crate::session::{CommandOutput, Connector, RemoteSession, UploadOptions, UploadSummary};

/// Opens real SSH sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    type Session = Session;

    async fn connect(&self, config: &SessionConfig) -> Result<Session> {
        Session::connect(config.clone()).await
    }
}

#[async_trait]
impl RemoteSession for Session {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.exec(command).await
    }

    async fn upload_tree(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        options: UploadOptions,
    ) -> Result<UploadSummary> {
        Session::upload_tree(self, local_dir, remote_dir, options).await
    }

    async fn close(&self) -> Result<()> {
        self.disconnect().await
    }
}
