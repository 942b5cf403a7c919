// ABOUTME: Validated domain types shared across modules.
// ABOUTME: Values are checked once at construction and trusted afterwards.

mod remote_path;

pub use remote_path::{RemotePath, RemotePathError};
