// ABOUTME: Validated remote deployment directory.
// ABOUTME: Rejects shell metacharacters so the path can be spliced into remote commands.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemotePathError {
    #[error("remote path cannot be empty")]
    Empty,

    #[error("remote path cannot be the filesystem root")]
    Root,

    #[error("invalid character in remote path: '{0}'")]
    InvalidChar(char),

    #[error("remote path cannot start with '-'")]
    LeadingDash,

    #[error("remote path cannot contain '.' or '..' components")]
    DotComponent,
}

/// Remote target directory with trailing separators removed.
///
/// Only characters that are inert in a POSIX shell are accepted, so the
/// value can be used unquoted in the fixed command templates (including the
/// `<path>_backup_*` glob, which must stay unquoted to expand). `~` is
/// rejected because `ls` would echo backups back with the home directory
/// expanded, and they would no longer match the path they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(value: &str) -> Result<Self, RemotePathError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RemotePathError::Empty);
        }

        let trimmed = value.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(RemotePathError::Root);
        }

        for c in trimmed.chars() {
            if !is_allowed(c) {
                return Err(RemotePathError::InvalidChar(c));
            }
        }

        // Would read as an option to `mv`, `rm` and `mkdir`.
        if trimmed.starts_with('-') {
            return Err(RemotePathError::LeadingDash);
        }
        if trimmed.split('/').any(|part| part == "." || part == "..") {
            return Err(RemotePathError::DotComponent);
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by every backup of this path.
    pub fn backup_prefix(&self) -> String {
        format!("{}_backup_", self.0)
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '@' | '+' | ',' | ':' | '%')
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_separators() {
        let path = RemotePath::new("/var/www/app//").unwrap();
        assert_eq!(path.as_str(), "/var/www/app");
    }

    #[test]
    fn rejects_root() {
        assert_eq!(RemotePath::new("/"), Err(RemotePathError::Root));
        assert_eq!(RemotePath::new("///"), Err(RemotePathError::Root));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(RemotePath::new("  "), Err(RemotePathError::Empty));
    }

    #[test]
    fn rejects_shell_metacharacters() {
        for bad in ["/var/www/a b", "/srv/$HOME", "/srv/app;rm", "/srv/`id`", "/srv/a*", "/srv/'x'", "~/www"] {
            assert!(RemotePath::new(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn rejects_option_like_paths() {
        assert_eq!(RemotePath::new("-rf"), Err(RemotePathError::LeadingDash));
        assert_eq!(RemotePath::new("--no-preserve-root/x"), Err(RemotePathError::LeadingDash));
        assert!(RemotePath::new("/srv/-app").is_ok());
    }

    #[test]
    fn rejects_dot_components() {
        for bad in ["/srv/app/..", "/srv/../etc", "./site", "/srv/app/.", ".."] {
            assert_eq!(RemotePath::new(bad), Err(RemotePathError::DotComponent), "{bad}");
        }
        assert!(RemotePath::new("/srv/.hidden/site.v2").is_ok());
    }

    #[test]
    fn accepts_relative_paths() {
        let path = RemotePath::new("sites/blog.example.com").unwrap();
        assert_eq!(path.backup_prefix(), "sites/blog.example.com_backup_");
    }
}
