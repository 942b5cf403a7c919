// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, authentication, and command execution.

use super::error::{Error, Result};
use crate::session::CommandOutput;
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::net::UnixStream;

/// How to authenticate against the remote host.
#[derive(Clone, Default)]
pub enum Auth {
    /// SSH agent, then the default key files under `~/.ssh`.
    #[default]
    Agent,
    /// A private key file.
    KeyFile(PathBuf),
    /// Password authentication.
    Password(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Agent => f.write_str("Agent"),
            Auth::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Auth::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Credential to present.
    pub auth: Auth,
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Timeout for command execution (default: 5 minutes).
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            auth: Auth::Agent,
            trust_on_first_use: false,
            known_hosts_path: None,
            command_timeout: Duration::from_secs(300),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth = Auth::KeyFile(path.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = Auth::Password(password.into());
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Interval between keepalive requests on an otherwise silent connection.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Transport settings for `config`.
///
/// The inactivity limit sits above `command_timeout`, so a silent command
/// hits its own timeout first.
fn transport_config(config: &SessionConfig) -> Config {
    Config {
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: 3,
        inactivity_timeout: Some(config.command_timeout + KEEPALIVE_INTERVAL),
        ..Default::default()
    }
}

/// Host key policy for one host: known_hosts lookup, optionally learning
/// unknown keys on first contact.
#[derive(Debug, Clone)]
struct KnownHosts {
    host: String,
    port: u16,
    file: Option<PathBuf>,
    learn_unknown: bool,
}

impl KnownHosts {
    fn for_config(config: &SessionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            file: config.known_hosts_path.clone(),
            learn_unknown: config.trust_on_first_use,
        }
    }

    fn lookup(&self, key: &ssh_key::PublicKey) -> std::result::Result<bool, russh::keys::Error> {
        match &self.file {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        }
    }

    fn remember(&self, key: &ssh_key::PublicKey) {
        let learned = match &self.file {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learned {
            tracing::warn!("Failed to save host key to known_hosts: {}", e);
        }
    }

    /// Whether to accept `key`. A key that differs from the recorded one is
    /// always refused.
    fn accept(&self, key: &ssh_key::PublicKey) -> bool {
        match self.lookup(key) {
            Ok(true) => true,
            Ok(false) if self.learn_unknown => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                self.remember(key);
                true
            }
            Ok(false) => false,
            Err(russh::keys::Error::KeyChanged { line }) => {
                tracing::error!(
                    "Host key for {}:{} does not match known_hosts line {}",
                    self.host,
                    self.port,
                    line
                );
                false
            }
            // Unreadable known_hosts file.
            Err(e) => {
                tracing::debug!("known_hosts lookup failed: {}", e);
                self.learn_unknown
            }
        }
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    known_hosts: KnownHosts,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(self.known_hosts.accept(server_public_key))
    }
}

/// A credential ready to present to the server.
enum Credential {
    Agent(AgentClient<UnixStream>),
    Key(Arc<ssh_key::PrivateKey>),
    Password(String),
}

impl Credential {
    async fn resolve(auth: &Auth) -> Result<Self> {
        match auth {
            Auth::KeyFile(path) => load_key(path).map(Credential::Key),
            Auth::Password(password) => Ok(Credential::Password(password.clone())),
            Auth::Agent => Self::agent_or_default_key().await,
        }
    }

    async fn agent_or_default_key() -> Result<Self> {
        if let Ok(agent) = AgentClient::connect_env().await {
            return Ok(Credential::Agent(agent));
        }

        let home = std::env::var_os("HOME").ok_or_else(|| {
            Error::AgentUnavailable("SSH agent not available and HOME not set".to_string())
        })?;
        let ssh_dir = PathBuf::from(home).join(".ssh");

        DEFAULT_KEY_FILES
            .iter()
            .find_map(|name| load_key(&ssh_dir.join(name)).ok())
            .map(Credential::Key)
            .ok_or_else(|| {
                Error::AgentUnavailable("SSH agent not available and no default keys found".to_string())
            })
    }

    /// Present this credential as `user`. Returns whether the server accepted it.
    async fn present(self, handle: &mut Handle<SshHandler>, user: &str) -> Result<bool> {
        match self {
            Credential::Agent(mut agent) => {
                let identities = agent.request_identities().await.map_err(|e| {
                    Error::AgentUnavailable(format!("failed to list agent keys: {}", e))
                })?;
                if identities.is_empty() {
                    return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
                }

                for identity in identities {
                    let accepted = handle
                        .authenticate_publickey_with(user, identity, None, &mut agent)
                        .await
                        .is_ok_and(|result| result.success());
                    if accepted {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Credential::Key(key) => {
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                let result = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await?;
                Ok(result.success())
            }
            Credential::Password(password) => {
                let result = handle.authenticate_password(user, password).await?;
                Ok(result.success())
            }
        }
    }
}

/// Key files tried under `~/.ssh` when no agent is running.
const DEFAULT_KEY_FILES: [&str; 3] = ["id_ed25519", "id_rsa", "id_ecdsa"];

fn load_key(path: &Path) -> Result<Arc<ssh_key::PrivateKey>> {
    load_secret_key(path, None)
        .map(Arc::new)
        .map_err(|e| Error::KeyLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Accumulates what a channel sends back until the command is done.
#[derive(Default)]
struct ChannelOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_status: Option<u32>,
    eof: bool,
}

impl ChannelOutput {
    /// Absorb one message. Returns true once nothing more is expected.
    fn absorb(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext: 1 } => self.stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => self.exit_status = Some(exit_status),
            ChannelMsg::Eof => self.eof = true,
            ChannelMsg::Close => return true,
            _ => {}
        }
        self.eof && self.exit_status.is_some()
    }

    /// No exit status means the channel died (connection drop, timeout).
    fn finish(self) -> Result<CommandOutput> {
        let exit_code = self.exit_status.ok_or(Error::ChannelClosed)?;
        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        })
    }
}

/// An established SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect and authenticate.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let credential = Credential::resolve(&config.auth).await?;

        let russh_config = Arc::new(transport_config(&config));
        let handler = SshHandler {
            known_hosts: KnownHosts::for_config(&config),
        };

        let mut handle = client::connect(russh_config, (config.host.as_str(), config.port), handler)
            .await
            .map_err(|e| Error::Connection(format!("{}:{}: {}", config.host, config.port, e)))?;

        if !credential.present(&mut handle, &config.user).await? {
            return Err(Error::AuthenticationFailed);
        }

        tracing::debug!(
            "SSH session established to {}@{}:{}",
            config.user,
            config.host,
            config.port
        );

        Ok(Self {
            config,
            handle,
            closed: AtomicBool::new(false),
        })
    }

    /// Remote host this session is connected to.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, None::<&[u8]>).await
    }

    /// Execute a command, streaming `input` to its stdin until it is exhausted.
    pub(crate) async fn exec_with_input<R>(&self, command: &str, input: R) -> Result<CommandOutput>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.exec_with_timeout(command, Some(input)).await
    }

    async fn exec_with_timeout<R>(&self, command: &str, input: Option<R>) -> Result<CommandOutput>
    where
        R: AsyncRead + Unpin + Send,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        let timeout = self.config.command_timeout;
        tokio::time::timeout(timeout, self.exec_inner(command, input))
            .await
            .map_err(|_| Error::CommandTimeout(timeout))?
    }

    async fn exec_inner<R>(&self, command: &str, input: Option<R>) -> Result<CommandOutput>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        if let Some(input) = input {
            channel
                .data(input)
                .await
                .map_err(|e| Error::CommandFailed(format!("failed to send stdin: {}", e)))?;
            channel
                .eof()
                .await
                .map_err(|e| Error::CommandFailed(format!("failed to close stdin: {}", e)))?;
        }

        let mut output = ChannelOutput::default();
        while let Some(msg) = channel.wait().await {
            if output.absorb(msg) {
                break;
            }
        }
        output.finish()
    }

    /// Disconnect the session. Only the first call reaches the server.
    pub async fn disconnect(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        tracing::debug!("SSH session to {} closed", self.config.host);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_defaults() {
        let config = SessionConfig::new("example.com", "deploy");
        assert_eq!(config.port, 22);
        assert!(!config.trust_on_first_use);
        assert!(matches!(config.auth, Auth::Agent));
        assert_eq!(config.command_timeout, Duration::from_secs(300));
    }

    #[test]
    fn builder_sets_credentials() {
        let config = SessionConfig::new("example.com", "deploy")
            .port(2222)
            .password("hunter2");
        assert_eq!(config.port, 2222);
        assert!(matches!(config.auth, Auth::Password(ref p) if p == "hunter2"));

        let config = config.key_path("/home/deploy/.ssh/id_ed25519");
        assert!(matches!(config.auth, Auth::KeyFile(_)));
    }

    #[test]
    fn silent_commands_outlive_the_inactivity_timeout() {
        let config = SessionConfig::new("example.com", "deploy")
            .command_timeout(Duration::from_secs(600));
        let transport = transport_config(&config);

        assert_eq!(transport.keepalive_interval, Some(KEEPALIVE_INTERVAL));
        let inactivity = transport.inactivity_timeout.unwrap();
        assert!(inactivity > config.command_timeout);
    }

    #[test]
    fn password_is_redacted_in_debug_output() {
        let config = SessionConfig::new("example.com", "deploy").password("hunter2");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn channel_output_waits_for_status_and_eof() {
        let mut output = ChannelOutput::default();
        assert!(!output.absorb(ChannelMsg::ExitStatus { exit_status: 2 }));
        assert!(output.absorb(ChannelMsg::Eof));
        assert_eq!(output.finish().unwrap().exit_code, 2);
    }

    #[test]
    fn channel_closed_without_status_is_an_error() {
        let mut output = ChannelOutput::default();
        assert!(output.absorb(ChannelMsg::Close));
        assert!(matches!(output.finish(), Err(Error::ChannelClosed)));
    }
}
