//! Execution traces and attempt results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::classify::ErrorKind;
use super::config::ProofMethod;
use super::step::StepOrigin;
use crate::session::types::GoalState;

/// Pseudo-step under which the last-resort oracle call is recorded.
pub const LAST_RESORT_STEP: &str = "$last_hammer$";

/// Offending step reported when the plan ran out before the proof closed.
pub const INCOMPLETE_PROOF_STEP: &str = "<incomplete proof>";

/// Message reported when the plan ran out before the proof closed.
pub const INCOMPLETE_PROOF_MESSAGE: &str = "The proof is not completed";

/// One step the engine tried, and what happened around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedStep {
    /// Canonical text of the step.
    pub step: String,

    /// Where the step came from.
    pub origin: StepOrigin,

    /// Rendered goal state observed before the step.
    pub goal: String,

    /// Whether the assistant accepted the step.
    pub succeeded: bool,

    /// Diagnostic of a rejected step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Structural error kind the diagnostic was classified as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Whether a local repair rewrote the queue.
    pub repaired: bool,

    /// Whether that repair was trusted on its own.
    pub repair_conclusive: bool,

    /// Outcome of the oracle, when it was consulted for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_succeeded: Option<bool>,

    /// Tactic the oracle suggested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_tactic: Option<String>,

    /// Outcome of backtracking, when it was attempted for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtrack_succeeded: Option<bool>,

    /// Time spent on this step, repairs and oracle included.
    pub elapsed_ms: u64,
}

impl ExecutedStep {
    pub fn new(step: impl Into<String>, origin: StepOrigin, goal: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            origin,
            goal: goal.into(),
            succeeded: false,
            error: None,
            error_kind: None,
            repaired: false,
            repair_conclusive: false,
            oracle_succeeded: None,
            oracle_tactic: None,
            backtrack_succeeded: None,
            elapsed_ms: 0,
        }
    }

    pub fn accepted(mut self) -> Self {
        self.succeeded = true;
        self
    }

    pub fn rejected(mut self, error: impl Into<String>) -> Self {
        self.succeeded = false;
        self.error = Some(error.into());
        self
    }

    /// Record an oracle consultation.
    pub fn record_oracle(&mut self, tactic: Option<&str>) {
        self.oracle_succeeded = Some(tactic.is_some());
        self.oracle_tactic = tactic.map(str::to_string);
    }
}

/// Where and why an attempt got stuck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofFailure {
    /// Goal state at the point of failure, when it could be read.
    pub stuck_goal: Option<GoalState>,

    /// Step that could not be executed.
    pub offending_step: String,

    /// Raw diagnostic; empty for transport failures.
    pub error_message: String,

    /// Steps that were executed when the attempt gave up.
    pub partial_script: Vec<String>,
}

impl ProofFailure {
    pub fn new(
        stuck_goal: Option<GoalState>,
        offending_step: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            stuck_goal,
            offending_step: offending_step.into(),
            error_message: error_message.into(),
            partial_script: Vec::new(),
        }
    }

    pub fn with_partial_script(mut self, script: Vec<String>) -> Self {
        self.partial_script = script;
        self
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptResult {
    /// The obligation was closed by this script.
    Success { final_script: Vec<String> },
    /// The attempt failed; the session was restored.
    Failure(ProofFailure),
}

/// Everything an attempt produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub attempt_id: Uuid,
    pub method: ProofMethod,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Every step tried, in order.
    pub trace: Vec<ExecutedStep>,
    pub result: AttemptResult,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, AttemptResult::Success { .. })
    }

    pub fn failure(&self) -> Option<&ProofFailure> {
        match &self.result {
            AttemptResult::Failure(failure) => Some(failure),
            AttemptResult::Success { .. } => None,
        }
    }

    /// The finished proof, one step per line.
    pub fn script(&self) -> Option<String> {
        match &self.result {
            AttemptResult::Success { final_script } => Some(final_script.join("\n")),
            AttemptResult::Failure(_) => None,
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        let repairs = self.trace.iter().filter(|s| s.repaired).count();
        let oracle_calls = self
            .trace
            .iter()
            .filter(|s| s.oracle_succeeded.is_some())
            .count();
        match &self.result {
            AttemptResult::Success { final_script } => format!(
                "[{}] SUCCESS: {} steps, {} repairs, {} oracle calls, {}ms",
                self.method,
                final_script.len(),
                repairs,
                oracle_calls,
                self.elapsed_ms()
            ),
            AttemptResult::Failure(failure) => format!(
                "[{}] FAILED at {:?}: {} ({} repairs, {} oracle calls, {}ms)",
                self.method,
                failure.offending_step,
                failure.error_message,
                repairs,
                oracle_calls,
                self.elapsed_ms()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(result: AttemptResult) -> ExecutionOutcome {
        let now = Utc::now();
        ExecutionOutcome {
            attempt_id: Uuid::new_v4(),
            method: ProofMethod::Plan,
            started_at: now,
            finished_at: now,
            trace: vec![ExecutedStep::new("intros.", StepOrigin::Plan, "P").accepted()],
            result,
        }
    }

    #[test]
    fn test_success_script() {
        let o = outcome(AttemptResult::Success {
            final_script: vec!["intros.".into(), "Qed.".into()],
        });
        assert!(o.is_success());
        assert_eq!(o.script().as_deref(), Some("intros.\nQed."));
        assert!(o.failure().is_none());
        assert!(o.summary().starts_with("[dsp] SUCCESS: 2 steps"));
    }

    #[test]
    fn test_failure_summary() {
        let o = outcome(AttemptResult::Failure(ProofFailure::new(
            None,
            INCOMPLETE_PROOF_STEP,
            INCOMPLETE_PROOF_MESSAGE,
        )));
        assert!(!o.is_success());
        assert!(o.script().is_none());
        assert!(o.summary().contains("The proof is not completed"));
    }

    #[test]
    fn test_record_oracle() {
        let mut step = ExecutedStep::new("auto.", StepOrigin::Plan, "P").rejected("boom");
        step.record_oracle(Some("sauto."));
        assert_eq!(step.oracle_succeeded, Some(true));
        assert_eq!(step.oracle_tactic.as_deref(), Some("sauto."));
        step.record_oracle(None);
        assert_eq!(step.oracle_succeeded, Some(false));
    }

    #[test]
    fn test_serializes_with_status_tag() {
        let o = outcome(AttemptResult::Success {
            final_script: vec!["Qed.".into()],
        });
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["result"]["status"], "success");
        assert_eq!(json["method"], "dsp");
    }
}
