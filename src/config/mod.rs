// ABOUTME: Deployment configuration types and parsing for hoist.yml.
// ABOUTME: Handles YAML parsing, file discovery, and one-time validation into a resolved form.

mod env_value;
mod init;

pub use env_value::EnvValue;
pub use init::init_config;

use crate::error::{Error, Result};
use crate::session::{DEFAULT_UPLOAD_CONCURRENCY, UploadOptions};
use crate::ssh::SessionConfig;
use crate::types::{RemotePath, RemotePathError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "hoist.yml";
pub const CONFIG_FILENAME_ALT: &str = "hoist.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".hoist/config.yml";

/// Artifact directory used when `local_path` is not set.
pub const DEFAULT_LOCAL_PATH: &str = "dist";
pub const DEFAULT_BUILD_COMMAND: &str = "npm run build";
pub const DEFAULT_RELOAD_COMMAND: &str = "systemctl reload nginx";

/// Problems found while validating a [`DeploymentConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid remote_path: {0}")]
    InvalidRemotePath(#[from] RemotePathError),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("upload_concurrency must be at least 1")]
    InvalidConcurrency,
}

/// Deployment settings as written by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<EnvValue>,

    #[serde(default)]
    pub private_key: Option<PathBuf>,

    #[serde(default)]
    pub local_path: Option<PathBuf>,

    #[serde(default)]
    pub remote_path: Option<String>,

    #[serde(default)]
    pub build_command: Option<String>,

    #[serde(default = "default_reload")]
    pub reload: bool,

    #[serde(default = "default_reload_command")]
    pub reload_command: String,

    #[serde(default)]
    pub backup_keep: Option<i64>,

    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    #[serde(default = "default_trust_first_connection")]
    pub trust_first_connection: bool,

    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

fn default_port() -> u16 {
    22
}

fn default_reload() -> bool {
    true
}

fn default_reload_command() -> String {
    DEFAULT_RELOAD_COMMAND.to_string()
}

fn default_upload_concurrency() -> usize {
    DEFAULT_UPLOAD_CONCURRENCY
}

fn default_trust_first_connection() -> bool {
    true
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            username: None,
            password: None,
            private_key: None,
            local_path: None,
            remote_path: None,
            build_command: None,
            reload: default_reload(),
            reload_command: default_reload_command(),
            backup_keep: None,
            upload_concurrency: default_upload_concurrency(),
            trust_first_connection: default_trust_first_connection(),
            known_hosts_path: None,
            command_timeout: default_command_timeout(),
        }
    }
}

/// A validated configuration, ready to drive a deployment.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub session: SessionConfig,
    pub local_path: PathBuf,
    /// True when `local_path` fell back to [`DEFAULT_LOCAL_PATH`].
    pub local_path_defaulted: bool,
    pub remote_path: RemotePath,
    pub build_command: String,
    /// Reload command, present only when reloading is enabled.
    pub reload_command: Option<String>,
    /// Retention count, present only when it is a positive integer.
    pub backup_keep: Option<usize>,
    pub upload: UploadOptions,
}

impl DeploymentConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Check required fields and resolve defaults.
    ///
    /// Performs no I/O beyond reading environment variables referenced by
    /// `password`.
    pub fn validate(&self) -> std::result::Result<ResolvedConfig, ConfigError> {
        let host = required(&self.host, "host")?;
        let username = required(&self.username, "username")?;
        let remote_path = RemotePath::new(required(&self.remote_path, "remote_path")?)?;

        if self.upload_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        let mut session = SessionConfig::new(host, username)
            .port(self.port)
            .trust_on_first_use(self.trust_first_connection)
            .command_timeout(self.command_timeout);
        // A key file wins over a password when both are configured.
        if let Some(key) = &self.private_key {
            session = session.key_path(expand_home(key));
        } else if let Some(password) = &self.password {
            session = session.password(password.resolve()?);
        }
        if let Some(path) = &self.known_hosts_path {
            session = session.known_hosts_path(expand_home(path));
        }

        let (local_path, local_path_defaulted) = match &self.local_path {
            Some(path) => (path.clone(), false),
            None => (PathBuf::from(DEFAULT_LOCAL_PATH), true),
        };

        Ok(ResolvedConfig {
            session,
            local_path,
            local_path_defaulted,
            remote_path,
            build_command: self
                .build_command
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BUILD_COMMAND.to_string()),
            reload_command: self.reload.then(|| self.reload_command.clone()),
            backup_keep: self
                .backup_keep
                .filter(|keep| *keep > 0)
                .and_then(|keep| usize::try_from(keep).ok()),
            upload: UploadOptions {
                concurrency: self.upload_concurrency,
            },
        })
    }
}

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> std::result::Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingField(field))
}

/// Expand a leading `~/` using `$HOME`.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
