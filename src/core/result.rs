//! Task outcomes and run-level aggregation.
//!
//! A task failure is data, not an error: the runner keeps executing and
//! reports everything at the end. Only fatal conditions (a stash pop that
//! fails, a task that cannot even be driven) travel as errors.

use serde::{Deserialize, Serialize};

/// Result of a single task, never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum TaskResult {
    /// The task's process exited zero.
    Passed,
    /// The task's process exited nonzero or could not be launched.
    Failed { message: String },
    /// No eligible files for this task in the current run.
    Skipped,
}

impl TaskResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskResult::Failed { .. })
    }
}

/// A task name paired with its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task: String,
    #[serde(flatten)]
    pub result: TaskResult,
}

/// Aggregated outcomes for one run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl RunReport {
    pub fn push(&mut self, outcome: TaskOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.result.is_failed())
    }

    /// Outcomes of failed tasks, in execution order.
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_failed())
    }
}
