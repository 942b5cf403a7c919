// ABOUTME: Step plan for a deployment run.
// ABOUTME: Fixes the ordered list of user-visible steps before execution starts.

use serde::Serialize;
use std::fmt;

/// Which entry point started the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Run the local build command, then deploy.
    Full,
    /// Deploy an artifact directory that is already built.
    UploadOnly,
}

/// A user-visible step of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Build,
    Connect,
    /// Check for an existing deployment, back it up and prune old backups.
    Backup,
    /// Recreate the target directory and transfer the artifact tree.
    Upload,
    Reload,
}

impl Step {
    pub fn description(&self) -> &'static str {
        match self {
            Step::Build => "Building artifacts locally",
            Step::Connect => "Connecting to server",
            Step::Backup => "Checking for an existing deployment",
            Step::Upload => "Uploading artifacts",
            Step::Reload => "Reloading service",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Ordered steps applicable to one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    steps: Vec<Step>,
}

impl DeployPlan {
    pub fn new(mode: DeployMode, reload: bool) -> Self {
        let mut steps = Vec::with_capacity(5);
        if mode == DeployMode::Full {
            steps.push(Step::Build);
        }
        steps.extend([Step::Connect, Step::Backup, Step::Upload]);
        if reload {
            steps.push(Step::Reload);
        }
        Self { steps }
    }

    pub fn total(&self) -> usize {
        self.steps.len()
    }

    /// 1-based position of `step`, if it is part of this plan.
    pub fn position(&self, step: Step) -> Option<usize> {
        self.steps.iter().position(|s| *s == step).map(|i| i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_deploy_with_reload_has_five_steps() {
        let plan = DeployPlan::new(DeployMode::Full, true);
        assert_eq!(plan.total(), 5);
        let positions: Vec<_> = [
            Step::Build,
            Step::Connect,
            Step::Backup,
            Step::Upload,
            Step::Reload,
        ]
        .into_iter()
        .map(|step| plan.position(step))
        .collect();
        assert_eq!(positions, [1, 2, 3, 4, 5].map(Some));
    }

    #[test]
    fn upload_only_without_reload_skips_both() {
        let plan = DeployPlan::new(DeployMode::UploadOnly, false);
        assert_eq!(plan.total(), 3);
        assert_eq!(plan.position(Step::Reload), None);
        assert_eq!(plan.position(Step::Connect), Some(1));
        assert_eq!(plan.position(Step::Build), None);
    }
}
