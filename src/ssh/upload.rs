// ABOUTME: Recursive directory upload over SSH exec channels.
// ABOUTME: Creates remote directories in batches, then streams files with bounded parallelism.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{self, TryStreamExt};
use walkdir::WalkDir;

use super::client::Session;
use super::error::{Error, Result};
use crate::session::{UploadOptions, UploadSummary};

/// Directories created per `mkdir -p` invocation.
const MKDIR_BATCH: usize = 100;

/// A file discovered in the local tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalFile {
    pub local: PathBuf,
    /// Path relative to the tree root, `/`-separated.
    pub relative: String,
}

/// Snapshot of a local directory tree, parents before children.
#[derive(Debug, Default)]
pub(crate) struct LocalTree {
    pub directories: Vec<String>,
    pub files: Vec<LocalFile>,
}

impl LocalTree {
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::LocalTree {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut tree = LocalTree::default();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::LocalTree {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;
            let relative = relative_path(root, entry.path())?;

            if entry.file_type().is_dir() {
                tree.directories.push(relative);
            } else if entry.file_type().is_file() {
                tree.files.push(LocalFile {
                    local: entry.into_path(),
                    relative,
                });
            }
        }

        Ok(tree)
    }

    /// `scan` on the blocking pool.
    pub async fn scan_blocking(root: &Path) -> Result<Self> {
        let owned = root.to_path_buf();
        tokio::task::spawn_blocking(move || Self::scan(&owned))
            .await
            .map_err(|e| Error::LocalTree {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?
    }
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|e| Error::LocalTree {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| Error::LocalTree {
            path: path.to_path_buf(),
            reason: "file name is not valid UTF-8".to_string(),
        })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

/// Single-quote a value for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Join a validated remote root with a quoted relative path.
fn remote_target(remote_dir: &str, relative: &str) -> String {
    format!("{}/{}", remote_dir, shell_quote(relative))
}

impl Session {
    /// Recursively upload `local_dir` into `remote_dir`, which must already exist.
    pub async fn upload_tree(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        options: UploadOptions,
    ) -> Result<UploadSummary> {
        let tree = LocalTree::scan_blocking(local_dir).await?;
        tracing::debug!(
            "Uploading {} ({} directories, {} files) to {}:{}",
            local_dir.display(),
            tree.directories.len(),
            tree.files.len(),
            self.host(),
            remote_dir
        );

        for batch in tree.directories.chunks(MKDIR_BATCH) {
            let targets: Vec<String> = batch
                .iter()
                .map(|dir| remote_target(remote_dir, dir))
                .collect();
            let output = self.exec(&format!("mkdir -p {}", targets.join(" "))).await?;
            if !output.success() {
                return Err(Error::CommandFailed(format!(
                    "failed to create remote directories: {}",
                    output.stderr.trim()
                )));
            }
        }

        let bytes = AtomicU64::new(0);
        let concurrency = options.concurrency.max(1);

        stream::iter(tree.files.iter().map(Ok::<_, Error>))
            .try_for_each_concurrent(concurrency, |file| {
                let bytes = &bytes;
                async move {
                    let sent = self.upload_file(file, remote_dir).await?;
                    bytes.fetch_add(sent, Ordering::Relaxed);
                    Ok(())
                }
            })
            .await?;

        Ok(UploadSummary {
            directories: tree.directories.len(),
            files: tree.files.len(),
            bytes: bytes.into_inner(),
        })
    }

    async fn upload_file(&self, file: &LocalFile, remote_dir: &str) -> Result<u64> {
        let source = tokio::fs::File::open(&file.local).await?;
        let size = source.metadata().await?.len();
        let command = format!("cat > {}", remote_target(remote_dir, &file.relative));

        let output = self
            .exec_with_input(&command, source)
            .await
            .map_err(|e| Error::TransferFailed {
                path: file.relative.clone(),
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(Error::TransferFailed {
                path: file.relative.clone(),
                reason: format!(
                    "remote write exited with {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }

        tracing::trace!("uploaded {} ({} bytes)", file.relative, size);
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain.txt"), "'plain.txt'");
        assert_eq!(shell_quote("it's.js"), "'it'\\''s.js'");
    }

    #[test]
    fn remote_target_keeps_root_unquoted() {
        assert_eq!(
            remote_target("/srv/www", "assets/app one.css"),
            "/srv/www/'assets/app one.css'"
        );
    }

    #[test]
    fn scan_lists_directories_before_their_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("assets/img")).unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("assets/app.js"), "console.log(1)").unwrap();
        fs::write(dir.path().join("assets/img/logo.svg"), "<svg/>").unwrap();

        let tree = LocalTree::scan(dir.path()).unwrap();

        assert_eq!(tree.directories, vec!["assets", "assets/img"]);
        let files: Vec<_> = tree.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(files, vec!["assets/app.js", "assets/img/logo.svg", "index.html"]);
    }

    #[tokio::test]
    async fn blocking_scan_matches_direct_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body{}").unwrap();

        let tree = LocalTree::scan_blocking(dir.path()).await.unwrap();

        assert_eq!(tree.directories, vec!["css"]);
        assert_eq!(tree.files.len(), 1);
        assert!(LocalTree::scan_blocking(&dir.path().join("missing")).await.is_err());
    }

    #[test]
    fn scan_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalTree::scan(&dir.path().join("dist")).unwrap_err();
        assert!(matches!(err, Error::LocalTree { .. }));
    }
}
