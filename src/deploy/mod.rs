// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports the entry points, state markers, backup helpers and progress events.

mod backup;
mod build;
mod command;
mod deployment;
mod error;
pub mod events;
mod orchestrator;
mod plan;
mod rollback;
mod state;
mod transitions;

pub use backup::{
    BACKUP_TIMESTAMP_FORMAT, BackupPath, backup_path_for, list_backups, parse_listing,
    prune_excess, select_excess,
};
pub use build::run_local_build;
pub use command::{RemoteCommand, SafePath};
pub use deployment::Deployment;
pub use error::{DeployError, DeployErrorKind};
pub use events::{DeployEvent, DeployObserver, SilentObserver};
pub use orchestrator::{full_deploy, upload_only};
pub use plan::{DeployMode, DeployPlan, Step};
pub use rollback::{
    RollbackOutcome, list_remote_backups, manual_rollback, restore_latest, swap_with_latest,
};
pub use state::{Completed, Connected, InFlight, Snapshotted, TargetPrepared, Uploaded};
pub use transitions::{DeployReport, TransitionResult};
