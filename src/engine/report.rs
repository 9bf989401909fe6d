use crate::engine::StepOutcome;
use crate::models::{Stage, Status, TaskRecord};

/// One record that moved during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub directory: String,
    pub from: (Stage, Status),
    pub to: (Stage, Status),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub directory: String,
    pub message: String,
}

/// Outcome of one engine pass
#[derive(Debug, Default)]
pub struct PassReport {
    pub transitions: Vec<Transition>,
    pub waiting: Vec<String>,
    pub deferred: Vec<RecordFailure>,
    pub errors: Vec<RecordFailure>,
    pub skipped: usize,
}

impl PassReport {
    pub fn record(&mut self, before: &TaskRecord, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Advanced(after) => {
                log::info!(
                    "'{}': {} / {} -> {} / {}",
                    before.directory, before.stage, before.status, after.stage, after.status
                );
                self.transitions.push(Transition {
                    directory: before.directory.clone(),
                    from: (before.stage, before.status),
                    to: (after.stage, after.status),
                });
            }
            StepOutcome::Waiting => self.waiting.push(before.directory.clone()),
            StepOutcome::Deferred(message) => self.deferred.push(RecordFailure {
                directory: before.directory.clone(),
                message,
            }),
            StepOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Records that failed validation during this pass
    pub fn failed(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(|t| t.to.1 == Status::Failed)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} advanced, {} waiting, {} deferred, {} failed, {} error(s), {} skipped",
            self.transitions.len(),
            self.waiting.len(),
            self.deferred.len(),
            self.failed().count(),
            self.errors.len(),
            self.skipped,
        )
    }
}
