// ABOUTME: Command module aggregator for the hoist CLI.
// ABOUTME: Re-exports deploy, rollback, and backups command handlers.

mod backups;
mod deploy;
mod rollback;

pub use backups::backups;
pub use deploy::deploy;
pub use rollback::rollback;
