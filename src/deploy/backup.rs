// ABOUTME: Backup naming and retention for deployed directories.
// ABOUTME: Derives timestamped backup paths, lists them newest first, and prunes the excess.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::session::RemoteSession;
use crate::types::RemotePath;

use super::command::RemoteCommand;
use super::error::DeployError;

/// Timestamp suffix format: 14 digits, UTC, no separators.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const TIMESTAMP_LEN: usize = 14;

/// A backup directory, `<remote_path>_backup_<YYYYMMDDHHMMSS>`.
///
/// The fixed-width timestamp makes lexicographic order chronological, so
/// `Ord` on the path string sorts backups oldest to newest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackupPath(String);

impl BackupPath {
    /// Parse a listing entry, accepting only backups of `remote_path`.
    pub fn parse(remote_path: &RemotePath, entry: &str) -> Option<Self> {
        let stamp = entry.trim().strip_prefix(&remote_path.backup_prefix())?;
        if stamp.len() == TIMESTAMP_LEN && stamp.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(entry.trim().to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 14-digit timestamp suffix.
    pub fn stamp(&self) -> &str {
        &self.0[self.0.len() - TIMESTAMP_LEN..]
    }

    /// When the backup was taken, if the suffix is a valid date.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(self.stamp(), BACKUP_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl fmt::Display for BackupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backup path for `remote_path` taken at `at` (second precision).
pub fn backup_path_for(remote_path: &RemotePath, at: DateTime<Utc>) -> BackupPath {
    BackupPath(format!(
        "{}{}",
        remote_path.backup_prefix(),
        at.format(BACKUP_TIMESTAMP_FORMAT)
    ))
}

/// Parse `ls` output into backups of `remote_path`, newest first.
///
/// Lines that are not `<remote_path>_backup_<14 digits>` are ignored.
pub fn parse_listing(remote_path: &RemotePath, stdout: &str) -> Vec<BackupPath> {
    let mut backups: Vec<BackupPath> = stdout
        .lines()
        .filter_map(|line| BackupPath::parse(remote_path, line))
        .collect();
    backups.sort_unstable_by(|a, b| b.cmp(a));
    backups.dedup();
    backups
}

/// List existing backups of `remote_path`, newest first.
///
/// An empty listing is not an error.
pub async fn list_backups<R: RemoteSession + ?Sized>(
    session: &R,
    remote_path: &RemotePath,
) -> Result<Vec<BackupPath>, DeployError> {
    let output = RemoteCommand::list_backups(remote_path).run(session).await?;
    Ok(parse_listing(remote_path, &output.stdout))
}

/// Backups beyond the `keep` newest, excluding `protected`.
///
/// `backups` must be newest first. Returns nothing unless `keep` is positive.
pub fn select_excess(
    backups: &[BackupPath],
    keep: Option<usize>,
    protected: Option<&BackupPath>,
) -> Vec<BackupPath> {
    match keep {
        Some(keep) if keep > 0 => backups
            .iter()
            .skip(keep)
            .filter(|b| Some(*b) != protected)
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}

/// Remove backups of `remote_path` beyond the `keep` newest in one batch.
///
/// Any failure, listing or removal, is reported as a single `Prune` error.
pub async fn prune_excess<R: RemoteSession + ?Sized>(
    session: &R,
    remote_path: &RemotePath,
    keep: Option<usize>,
    protected: Option<&BackupPath>,
) -> Result<Vec<BackupPath>, DeployError> {
    if !matches!(keep, Some(k) if k > 0) {
        return Ok(Vec::new());
    }

    let backups = list_backups(session, remote_path)
        .await
        .map_err(|e| DeployError::Prune {
            reason: e.to_string(),
        })?;

    let excess = select_excess(&backups, keep, protected);
    if excess.is_empty() {
        tracing::debug!("No backups beyond the newest {:?} to remove", keep);
        return Ok(excess);
    }

    tracing::info!(
        "Removing {} old backup(s): {}",
        excess.len(),
        excess
            .iter()
            .map(BackupPath::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    RemoteCommand::remove_all(&excess)
        .run_checked(session)
        .await
        .map_err(|e| DeployError::Prune {
            reason: e.to_string(),
        })?;

    Ok(excess)
}
