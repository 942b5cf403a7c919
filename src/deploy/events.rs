// ABOUTME: Progress events emitted by the deployment orchestrator.
// ABOUTME: Observers decide how to render them (terminal text, JSON lines, logs).

use serde::Serialize;

use super::plan::Step;

/// Something that happened during a run, in order of occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeployEvent {
    StepStarted {
        index: usize,
        total: usize,
        step: Step,
    },
    LocalPathDefaulted {
        path: String,
    },
    NoExistingDeployment,
    BackupCreated {
        path: String,
    },
    BackupsPruned {
        removed: Vec<String>,
    },
    PruneFailed {
        reason: String,
    },
    TargetPrepared {
        path: String,
    },
    Uploaded {
        files: usize,
        bytes: u64,
    },
    ServiceReloaded,
    RollbackStarted {
        reason: String,
    },
    RolledBack {
        restored: String,
        reloaded: bool,
    },
    RollbackUnavailable,
    RollbackFailed {
        reason: String,
    },
    SessionCloseFailed {
        reason: String,
    },
    Succeeded {
        backup: Option<String>,
    },
    Failed {
        error: String,
    },
}

/// Receives deployment events.
pub trait DeployObserver: Send + Sync {
    fn on_event(&self, event: &DeployEvent);
}

impl<F> DeployObserver for F
where
    F: Fn(&DeployEvent) + Send + Sync,
{
    fn on_event(&self, event: &DeployEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl DeployObserver for SilentObserver {
    fn on_event(&self, _event: &DeployEvent) {}
}

/// Log `event` at debug level and hand it to `observer`.
pub(crate) fn emit(observer: &dyn DeployObserver, event: DeployEvent) {
    tracing::debug!(?event, "deploy event");
    observer.on_event(&event);
}

/// Announce the start of `step` if the plan includes it.
pub(crate) fn start_step(plan: &super::DeployPlan, step: Step, observer: &dyn DeployObserver) {
    if let Some(index) = plan.position(step) {
        tracing::info!("[{}/{}] {}", index, plan.total(), step);
        emit(
            observer,
            DeployEvent::StepStarted {
                index,
                total: plan.total(),
                step,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn closures_are_observers() {
        let seen = Mutex::new(Vec::new());
        let observer = |event: &DeployEvent| seen.lock().push(event.clone());

        emit(&observer, DeployEvent::NoExistingDeployment);
        assert_eq!(seen.lock().as_slice(), &[DeployEvent::NoExistingDeployment]);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = DeployEvent::StepStarted {
            index: 2,
            total: 5,
            step: Step::Connect,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"step_started","index":2,"total":5,"step":"connect"}"#
        );
    }
}
