// ABOUTME: Test support utilities.
// ABOUTME: Provides an in-memory fake remote host and a recording observer.

use async_trait::async_trait;
use hoist::deploy::{DeployEvent, DeployObserver};
use hoist::session::{CommandOutput, Connector, RemoteSession, UploadOptions, UploadSummary};
use hoist::ssh::{self, SessionConfig};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("hoist=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Contents of a directory on the fake host; only the label matters.
pub const UPLOADED: &str = "uploaded";
pub const EMPTY: &str = "";

#[derive(Default)]
struct Inner {
    /// Directory path to a label describing what it holds.
    dirs: Mutex<BTreeMap<String, String>>,
    commands: Mutex<Vec<String>>,
    fail_upload: Mutex<Option<String>>,
    fail_connect: Mutex<Option<String>>,
    /// Commands starting with one of these exit with status 1.
    failing_prefixes: Mutex<Vec<String>>,
    reload_stderr: Mutex<Option<String>>,
    uploads: AtomicUsize,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

/// A remote host that interprets the deployment's shell commands against an
/// in-memory directory map.
///
/// Cloning shares state, so the connector and the session it hands out are
/// the same host.
#[derive(Clone, Default)]
pub struct FakeRemote {
    inner: Arc<Inner>,
}

#[allow(dead_code)]
impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory holding `label`.
    pub fn with_dir(self, path: &str, label: &str) -> Self {
        self.inner
            .dirs
            .lock()
            .insert(path.to_string(), label.to_string());
        self
    }

    pub fn fail_upload(self, reason: &str) -> Self {
        *self.inner.fail_upload.lock() = Some(reason.to_string());
        self
    }

    pub fn fail_connect(self, reason: &str) -> Self {
        *self.inner.fail_connect.lock() = Some(reason.to_string());
        self
    }

    pub fn fail_commands_starting_with(self, prefix: &str) -> Self {
        self.inner.failing_prefixes.lock().push(prefix.to_string());
        self
    }

    pub fn reload_stderr(self, stderr: &str) -> Self {
        *self.inner.reload_stderr.lock() = Some(stderr.to_string());
        self
    }

    pub fn dirs(&self) -> BTreeMap<String, String> {
        self.inner.dirs.lock().clone()
    }

    pub fn label(&self, path: &str) -> Option<String> {
        self.inner.dirs.lock().get(path).cloned()
    }

    /// Directories whose path starts with `prefix`, in name order.
    pub fn dirs_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.inner
            .dirs
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.inner.commands.lock().clone()
    }

    /// Index of the first command starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.starts_with(prefix))
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    pub fn uploads(&self) -> usize {
        self.inner.uploads.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    fn interpret(&self, command: &str) -> CommandOutput {
        let mut dirs = self.inner.dirs.lock();

        if let Some(rest) = command.strip_prefix("if [ -d ") {
            let path = rest.split(' ').next().unwrap_or_default();
            let stdout = if dirs.contains_key(path) { "yes\n" } else { "" };
            return ok(stdout);
        }

        if let Some(rest) = command.strip_prefix("mv ") {
            let mut parts = rest.split(' ');
            let (from, to) = (parts.next().unwrap(), parts.next().unwrap());
            return match dirs.remove(from) {
                Some(label) => {
                    dirs.insert(to.to_string(), label);
                    ok("")
                }
                None => failed(&format!("mv: cannot stat '{from}': No such file or directory")),
            };
        }

        if let Some(rest) = command.strip_prefix("ls -1d ") {
            let prefix = rest.split('*').next().unwrap_or_default();
            let mut matches: Vec<&String> =
                dirs.keys().filter(|k| k.starts_with(prefix)).collect();
            matches.sort_by(|a, b| b.cmp(a));
            let stdout: String = matches.iter().map(|m| format!("{m}\n")).collect();
            return ok(&stdout);
        }

        if let Some(rest) = command.strip_prefix("rm -rf ") {
            for path in rest.split(' ') {
                dirs.remove(path);
            }
            return ok("");
        }

        if let Some(path) = command.strip_prefix("mkdir -p ") {
            dirs.entry(path.to_string()).or_insert_with(|| EMPTY.to_string());
            return ok("");
        }

        // Anything else is the reload command.
        match self.inner.reload_stderr.lock().clone() {
            Some(stderr) => CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr,
            },
            None => ok(""),
        }
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn failed(stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl RemoteSession for FakeRemote {
    async fn run(&self, command: &str) -> ssh::Result<CommandOutput> {
        self.inner.commands.lock().push(command.to_string());

        let injected = self
            .inner
            .failing_prefixes
            .lock()
            .iter()
            .any(|p| command.starts_with(p.as_str()));
        if injected {
            return Ok(failed("injected failure"));
        }

        Ok(self.interpret(command))
    }

    async fn upload_tree(
        &self,
        _local_dir: &Path,
        remote_dir: &str,
        _options: UploadOptions,
    ) -> ssh::Result<UploadSummary> {
        self.inner.uploads.fetch_add(1, Ordering::SeqCst);
        self.inner
            .commands
            .lock()
            .push(format!("<upload {remote_dir}>"));

        if let Some(reason) = self.inner.fail_upload.lock().clone() {
            return Err(ssh::Error::TransferFailed {
                path: "index.html".to_string(),
                reason,
            });
        }

        let mut dirs = self.inner.dirs.lock();
        match dirs.get_mut(remote_dir) {
            Some(label) => *label = UPLOADED.to_string(),
            None => {
                return Err(ssh::Error::TransferFailed {
                    path: remote_dir.to_string(),
                    reason: "no such directory".to_string(),
                });
            }
        }

        Ok(UploadSummary {
            directories: 1,
            files: 3,
            bytes: 1024,
        })
    }

    async fn close(&self) -> ssh::Result<()> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Connector for FakeRemote {
    type Session = FakeRemote;

    async fn connect(&self, _config: &SessionConfig) -> ssh::Result<FakeRemote> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        match self.inner.fail_connect.lock().clone() {
            Some(reason) => Err(ssh::Error::Connection(reason)),
            None => Ok(self.clone()),
        }
    }
}

/// Records every event it sees.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<DeployEvent>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn events(&self) -> Vec<DeployEvent> {
        self.events.lock().clone()
    }

    pub fn contains(&self, predicate: impl Fn(&DeployEvent) -> bool) -> bool {
        self.events.lock().iter().any(predicate)
    }
}

impl DeployObserver for Recorder {
    fn on_event(&self, event: &DeployEvent) {
        self.events.lock().push(event.clone());
    }
}
