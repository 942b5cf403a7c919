// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Carries the resolved config and what this run has done so far.

use std::marker::PhantomData;

use crate::config::ResolvedConfig;
use crate::session::UploadSummary;

use super::backup::BackupPath;
use super::state::Connected;

/// A deployment in progress, parameterized by its current state.
///
/// `backup` is set exactly once, right after the rename of the previous
/// deployment is confirmed. It decides whether a failure rolls back.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) config: ResolvedConfig,
    pub(crate) backup: Option<BackupPath>,
    pub(crate) pruned: Vec<BackupPath>,
    pub(crate) upload: UploadSummary,
    pub(crate) reloaded: bool,
    pub(crate) _state: PhantomData<S>,
}

impl Deployment<Connected> {
    /// Start a deployment on an open session.
    pub fn new(config: ResolvedConfig) -> Self {
        Deployment {
            config,
            backup: None,
            pruned: Vec::new(),
            upload: UploadSummary::default(),
            reloaded: false,
            _state: PhantomData,
        }
    }
}

impl<S> Deployment<S> {
    /// Backup created by this run, if any.
    pub fn backup(&self) -> Option<&BackupPath> {
        self.backup.as_ref()
    }
}
