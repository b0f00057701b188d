//! Backtracking through executed steps.
//!
//! The session only offers a linear undo, but the script it holds is a tree
//! of bullet branches and brace blocks. Backtracking walks that tree upwards:
//! each round gives the oracle a chance at the current goal, then undoes the
//! innermost failing branch (or the last step, automation tail, or brace
//! block) and tries again one level higher.

use std::time::Instant;

use tracing::debug;

use super::bullets::{is_bullet, BulletStack};
use super::oracle::{HammerOracle, OracleVerdict};
use super::outcome::ExecutedStep;
use super::queue::PendingQueue;
use super::step::StepOrigin;
use crate::error::Result;
use crate::session::{rewind_to, AppendError, ProofSession};

/// Marker opening the proof body; never undone.
const PROOF_START: &str = "Proof.";

fn last_step(steps: &[String]) -> Option<String> {
    steps.last().map(|s| s.trim().to_string())
}

/// Index where the innermost open bullet's current run starts.
///
/// The search begins after the last occurrence of the parent bullet, so
/// completed siblings of the parent are never touched.
fn branch_start(steps: &[String], stack: &BulletStack, floor: usize) -> Option<usize> {
    let target = stack.innermost()?;
    let from = match stack.parent() {
        Some(parent) => steps
            .iter()
            .rposition(|s| s.trim() == parent)
            .map_or(0, |i| i + 1),
        None => 0,
    };
    steps
        .iter()
        .enumerate()
        .skip(from.max(floor))
        .find(|(_, s)| s.trim() == target)
        .map(|(i, _)| i)
}

/// Undo a brace block ending at the last executed step, nested blocks included.
pub fn undo_brace_block<S: ProofSession + ?Sized>(session: &mut S, floor: usize) -> Result<()> {
    let mut depth = 0usize;
    while session.steps().len() > floor {
        let Some(last) = last_step(session.steps()) else {
            break;
        };
        if last == "}" {
            depth += 1;
        } else if last.ends_with('{') {
            depth = depth.saturating_sub(1);
        }
        session.undo_last()?;
        if depth == 0 {
            break;
        }
    }
    Ok(())
}

/// Recorded for an oracle step that applied but left goals open.
pub const GOALS_REMAIN: &str = "goals remain after oracle step";

/// What a backtracking run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacktrackReport {
    /// Whether the oracle closed the focused goal.
    pub recovered: bool,
    /// Oracle rounds, successful or not.
    pub oracle_calls: usize,
    /// Executed steps undone along the way.
    pub undone: usize,
    /// Oracle step left in the session on recovery.
    pub tactic: Option<String>,
}

/// Try to recover by undoing executed steps.
///
/// Every oracle round is appended to `trace`. On recovery the session holds
/// the oracle's step and `queue` has lost the abandoned branch. Gives up
/// when nothing above `floor` is left to undo.
pub fn backtrack<S: ProofSession + ?Sized>(
    session: &mut S,
    oracle: &HammerOracle,
    queue: &mut PendingQueue,
    floor: usize,
    trace: &mut Vec<ExecutedStep>,
) -> Result<BacktrackReport> {
    let mut report = BacktrackReport::default();
    loop {
        report.oracle_calls += 1;
        let started = Instant::now();
        let goal = session.current_goals()?.render_current();
        let verdict = oracle.invoke(&mut *session)?;
        let step = verdict
            .suggestion()
            .unwrap_or(oracle.config().tactic.as_str())
            .to_string();
        let mut record = ExecutedStep::new(step, StepOrigin::Oracle, goal);
        record.record_oracle(verdict.suggestion());

        match verdict {
            OracleVerdict::Suggested(tactic) => match session.append(&tactic) {
                Ok(_) => {
                    if session.current_goals()?.goals.is_empty() {
                        debug!(%tactic, depth = session.steps().len(), "backtracking recovered");
                        record = record.accepted();
                        record.elapsed_ms = started.elapsed().as_millis() as u64;
                        trace.push(record);
                        report.recovered = true;
                        report.tactic = Some(tactic);
                        return Ok(report);
                    }
                    session.undo_last()?;
                    record = record.rejected(GOALS_REMAIN);
                }
                Err(AppendError::Rejected { messages }) => {
                    record = record.rejected(messages.last().cloned().unwrap_or_default());
                }
                Err(AppendError::Transport(e)) => {
                    trace.push(record);
                    return Err(e);
                }
            },
            OracleVerdict::Failed(message) => record = record.rejected(message),
        }
        record.elapsed_ms = started.elapsed().as_millis() as u64;
        trace.push(record);

        if session.steps().len() <= floor {
            return Ok(report);
        }
        let Some(last) = last_step(session.steps()) else {
            return Ok(report);
        };
        if last == PROOF_START {
            return Ok(report);
        }

        let depth = session.steps().len();
        if is_bullet(&last) {
            let stack = BulletStack::reconstruct(session.steps().iter().map(String::as_str));
            if let Some(start) = branch_start(session.steps(), &stack, floor) {
                debug!(bullet = %last, start, "abandoning branch");
                rewind_to(&mut *session, start)?;
            }
            match stack.parent() {
                None => queue.clear(),
                Some(parent) => {
                    queue.drop_until(parent);
                }
            }
        }

        if session.steps().len() > floor {
            session.undo_last()?;
        }
        while session.steps().len() > floor
            && last_step(session.steps()).is_some_and(|s| oracle.is_automation_tactic(&s))
        {
            session.undo_last()?;
        }
        if session.steps().len() > floor && last_step(session.steps()).as_deref() == Some("}") {
            undo_brace_block(&mut *session, floor)?;
        }
        report.undone += depth - session.steps().len();
        debug!(depth = session.steps().len(), "backtracked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::step::ProofStep;
    use crate::session::sim::SimSession;
    use pretty_assertions::assert_eq;

    fn apply(session: &mut SimSession, steps: &[&str]) {
        for step in steps {
            session.append(step).unwrap();
        }
    }

    fn queue(texts: &[&str]) -> PendingQueue {
        texts.iter().map(|t| ProofStep::new(*t)).collect()
    }

    fn run(session: &mut SimSession, q: &mut PendingQueue, floor: usize) -> BacktrackReport {
        let mut trace = Vec::new();
        backtrack(session, &HammerOracle::default(), q, floor, &mut trace).unwrap()
    }

    #[test]
    fn test_inner_branch_is_abandoned_alone() {
        let mut s = SimSession::new("P n")
            .with_tactic("induction n.", &["P 0", "P (S n)"])
            .with_tactic_on("split.", "P 0", &["A", "B"])
            .with_tactic_on("sauto.", "P 0", &[])
            .with_hammer("P 0", "sauto.");
        apply(&mut s, &["induction n.", "-", "split.", "+"]);

        // Pending: the rest of the `+` branch, then the next `-` sibling.
        let mut q = queue(&["+", "right.", "-", "auto."]);
        let mut trace = Vec::new();
        let report = backtrack(&mut s, &HammerOracle::default(), &mut q, 0, &mut trace).unwrap();

        assert_eq!(
            report,
            BacktrackReport {
                recovered: true,
                oracle_calls: 2,
                undone: 2,
                tactic: Some("sauto.".to_string()),
            }
        );
        assert_eq!(q.texts(), vec!["-", "auto."]);
        assert_eq!(
            s.steps(),
            &["induction n.".to_string(), "-".to_string(), "sauto.".to_string()]
        );

        // One record per oracle round; the winning step is recorded as applied.
        assert_eq!(trace.len(), 2);
        assert!(trace.iter().all(|r| r.origin == StepOrigin::Oracle));
        assert_eq!(trace[0].step, "hammer.");
        assert_eq!(trace[0].oracle_succeeded, Some(false));
        assert!(!trace[0].succeeded);
        assert_eq!(trace[1].step, "sauto.");
        assert_eq!(trace[1].oracle_tactic.as_deref(), Some("sauto."));
        assert!(trace[1].succeeded);
    }

    #[test]
    fn test_oracle_step_leaving_goals_is_recorded_and_undone() {
        let mut s = SimSession::new("P")
            .with_tactic("intros.", &["Q"])
            .with_tactic_on("sauto.", "Q", &["R"])
            .with_hammer("Q", "sauto.");
        apply(&mut s, &["intros."]);

        let mut q = PendingQueue::new();
        let mut trace = Vec::new();
        let report = backtrack(&mut s, &HammerOracle::default(), &mut q, 0, &mut trace).unwrap();

        assert!(!report.recovered);
        assert_eq!(report.undone, 1);
        assert_eq!(trace[0].step, "sauto.");
        assert_eq!(trace[0].error.as_deref(), Some(GOALS_REMAIN));
        assert!(s.steps().is_empty());
    }

    #[test]
    fn test_outer_branch_clears_queue() {
        let mut s = SimSession::new("P n")
            .with_tactic("intros.", &["Q n"])
            .with_tactic_on("induction n.", "Q n", &["Q 0", "Q (S n)"])
            .with_tactic_on("sauto.", "Q n", &[])
            .with_hammer("Q n", "sauto.");
        apply(&mut s, &["intros.", "induction n.", "-"]);

        let mut q = queue(&["-", "auto."]);
        let report = run(&mut s, &mut q, 0);

        assert!(report.recovered);
        assert!(q.is_empty());
        assert_eq!(s.steps(), &["intros.".to_string(), "sauto.".to_string()]);
    }

    #[test]
    fn test_automation_tail_is_undone() {
        let mut s = SimSession::new("P")
            .with_tactic("intros.", &["Q"])
            .with_tactic_on("sauto.", "Q", &["R"])
            .with_tactic_on("scrush.", "R", &["S"])
            .with_tactic_on("qblast.", "Q", &[])
            .with_hammer("Q", "qblast.");
        apply(&mut s, &["intros.", "sauto.", "scrush."]);

        let mut q = PendingQueue::new();
        let report = run(&mut s, &mut q, 0);

        assert!(report.recovered);
        assert_eq!(report.undone, 2);
        assert_eq!(s.steps(), &["intros.".to_string(), "qblast.".to_string()]);
    }

    #[test]
    fn test_exhaustion_returns_false() {
        let mut s = SimSession::new("P")
            .with_tactic("intros.", &["Q"])
            .with_tactic("simpl.", &["R"]);
        apply(&mut s, &["intros.", "simpl."]);

        let mut q = queue(&["auto."]);
        let mut trace = Vec::new();
        let report = backtrack(&mut s, &HammerOracle::default(), &mut q, 0, &mut trace).unwrap();

        assert!(!report.recovered);
        assert_eq!(report.tactic, None);
        assert!(s.steps().is_empty());
        assert_eq!(s.hammer_calls(), 3);
        assert_eq!(report.oracle_calls, 3);
        assert_eq!(trace.len(), 3);
    }

    #[test]
    fn test_stops_at_proof_start() {
        let mut s = SimSession::new("P")
            .with_tactic("Proof.", &["P"])
            .with_tactic("intros.", &["Q"]);
        apply(&mut s, &["Proof.", "intros."]);

        let mut q = PendingQueue::new();
        assert!(!run(&mut s, &mut q, 0).recovered);
        assert_eq!(s.steps(), &["Proof.".to_string()]);
    }

    #[test]
    fn test_respects_floor() {
        let mut s = SimSession::new("P").with_tactic("intros.", &["Q"]);
        apply(&mut s, &["intros."]);

        let mut q = PendingQueue::new();
        assert!(!run(&mut s, &mut q, 1).recovered);
        assert_eq!(s.steps().len(), 1);
    }

    #[test]
    fn test_nested_brace_block_undone_as_unit() {
        let mut s = SimSession::new("G")
            .with_tactic("split.", &["A", "B"])
            .with_tactic_on("left.", "A", &[])
            .with_tactic_on("right.", "B", &[]);
        apply(
            &mut s,
            &["split.", "{", "split.", "{", "left.", "}", "right.", "}"],
        );

        undo_brace_block(&mut s, 0).unwrap();
        assert_eq!(s.steps(), &["split.".to_string()]);
    }

    #[test]
    fn test_branch_start_skips_finished_siblings() {
        let steps: Vec<String> = ["a.", "-", "b.", "+", "c.", "-", "d.", "+", "e.", "+"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let stack = BulletStack::reconstruct(steps.iter().map(String::as_str));
        // The `+` run under the second `-` starts at index 7.
        assert_eq!(branch_start(&steps, &stack, 0), Some(7));
    }
}
