// ABOUTME: Diagnostics accumulator for non-fatal warnings during deployment.
// ABOUTME: Collects warnings that shouldn't fail a deployment but should be shown to users.

use crate::deploy::DeployEvent;

/// Collects non-fatal warnings during deployment operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning. The library has already logged it.
    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Record `event` if it is a warning.
    pub fn observe(&mut self, event: &DeployEvent) {
        if let Some(warning) = Warning::from_event(event) {
            self.warn(warning);
        }
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Remove and return the collected warnings.
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self::new(WarningKind::SshDisconnect, message)
    }

    /// The warning carried by `event`, if any.
    pub fn from_event(event: &DeployEvent) -> Option<Self> {
        let warning = match event {
            DeployEvent::LocalPathDefaulted { path } => Self::new(
                WarningKind::LocalPathDefaulted,
                format!("local_path not set, using {}", path),
            ),
            DeployEvent::PruneFailed { reason } => Self::new(WarningKind::PruneFailed, reason),
            DeployEvent::RollbackUnavailable => Self::new(
                WarningKind::RollbackUnavailable,
                "no backup available to roll back to, manual intervention required",
            ),
            DeployEvent::RollbackFailed { reason } => {
                Self::new(WarningKind::RollbackFailed, reason)
            }
            DeployEvent::SessionCloseFailed { reason } => {
                Self::ssh_disconnect(format!("SSH disconnect failed: {}", reason))
            }
            _ => return None,
        };
        Some(warning)
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// No artifact directory configured; the default was used.
    LocalPathDefaulted,
    /// Old backups could not be removed.
    PruneFailed,
    /// Rollback found no backup to restore.
    RollbackUnavailable,
    /// Rollback was attempted and failed.
    RollbackFailed,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(diag.warnings().is_empty());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn observe_keeps_only_warnings() {
        let mut diag = Diagnostics::default();

        diag.observe(&DeployEvent::ServiceReloaded);
        diag.observe(&DeployEvent::PruneFailed {
            reason: "permission denied".to_string(),
        });
        diag.observe(&DeployEvent::SessionCloseFailed {
            reason: "connection reset".to_string(),
        });

        let kinds: Vec<_> = diag.warnings().iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::PruneFailed, WarningKind::SshDisconnect]);
    }

    #[test]
    fn every_warning_event_maps_to_a_warning() {
        let events = [
            DeployEvent::LocalPathDefaulted {
                path: "dist".to_string(),
            },
            DeployEvent::PruneFailed {
                reason: "x".to_string(),
            },
            DeployEvent::RollbackUnavailable,
            DeployEvent::RollbackFailed {
                reason: "x".to_string(),
            },
            DeployEvent::SessionCloseFailed {
                reason: "x".to_string(),
            },
        ];
        for event in &events {
            assert!(Warning::from_event(event).is_some(), "{event:?}");
        }
    }

    #[test]
    fn take_drains_warnings() {
        let mut diag = Diagnostics::default();
        diag.warn(Warning::ssh_disconnect("test"));
        assert_eq!(diag.take().len(), 1);
        assert!(diag.warnings().is_empty());
    }
}
