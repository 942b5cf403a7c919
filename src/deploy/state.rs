// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Zero-sized types enforce valid state transitions at compile time.

/// Session open, nothing on the remote host touched yet.
/// Available actions: `snapshot()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Connected;

/// Existing deployment (if any) moved aside and old backups pruned.
/// Available actions: `prepare_target()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Snapshotted;

/// Empty target directory in place.
/// Available actions: `upload()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetPrepared;

/// Artifact tree transferred.
/// Available actions: `reload()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Uploaded;

/// Deployment finished.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Completed;

mod sealed {
    pub trait Sealed {}
}

/// States from which a failed run can still be rolled back.
pub trait InFlight: sealed::Sealed {}

impl sealed::Sealed for Connected {}
impl sealed::Sealed for Snapshotted {}
impl sealed::Sealed for TargetPrepared {}
impl sealed::Sealed for Uploaded {}

impl InFlight for Connected {}
impl InFlight for Snapshotted {}
impl InFlight for TargetPrepared {}
impl InFlight for Uploaded {}
