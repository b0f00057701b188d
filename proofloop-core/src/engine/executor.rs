//! Step executor.
//!
//! Runs a plan against a session one step at a time. A rejected step is
//! classified and repaired locally when possible; otherwise the attempt
//! escalates, either to the automation oracle or to backtracking. Every
//! attempt ends with the session either closed or rewound to where it
//! started.

use std::time::Instant;

use tracing::{debug, info, warn};

use super::backtrack::backtrack;
use super::bullets::BulletStack;
use super::classify::{classify, focus_next_bullet, focus_wants_unfocus};
use super::config::EngineConfig;
use super::oracle::{HammerOracle, OracleVerdict};
use super::outcome::{
    AttemptResult, ExecutedStep, ProofFailure, INCOMPLETE_PROOF_MESSAGE, INCOMPLETE_PROOF_STEP,
    LAST_RESORT_STEP,
};
use super::progress::progress;
use super::queue::PendingQueue;
use super::repair::{repair, RepairContext};
use super::step::{ProofStep, StepOrigin};
use crate::error::{Error, Result};
use crate::session::{rewind_to, AppendError, GoalState, ProofSession};

/// Message of the failure raised when the step budget runs out.
pub const BUDGET_EXHAUSTED: &str = "step budget exhausted";

/// Message of the failure raised when an oracle step changes nothing.
pub const NO_PROGRESS: &str = "No progress";

/// What happens when a rejected step has no conclusive repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Ask the oracle for a replacement step.
    Oracle,
    /// Undo executed steps until the oracle can finish a branch.
    Backtrack,
}

/// Why an attempt stopped before closing the proof.
#[derive(Debug)]
enum Halt {
    /// The proof could not be completed.
    Failed(ProofFailure),
    /// The session failed underneath us.
    Session(Error),
    /// The session could not be put back; nothing more can be done with it.
    Restore(Error),
}

impl From<Error> for Halt {
    fn from(e: Error) -> Self {
        Self::Session(e)
    }
}

impl Halt {
    fn failure(
        goal: Option<GoalState>,
        step: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Failed(ProofFailure::new(goal, step, message))
    }
}

type Flow<T> = std::result::Result<T, Halt>;

/// One attempt at closing an obligation.
///
/// Holds the session exclusively for its whole lifetime.
pub struct Attempt<'a, S: ProofSession + ?Sized> {
    config: &'a EngineConfig,
    oracle: &'a HammerOracle,
    session: &'a mut S,
    baseline: usize,
    trace: Vec<ExecutedStep>,
    /// Records produced while recovering a step; they follow its own record.
    recovery: Vec<ExecutedStep>,
    popped: usize,
    current: String,
}

impl<'a, S: ProofSession + ?Sized> Attempt<'a, S> {
    pub fn new(config: &'a EngineConfig, oracle: &'a HammerOracle, session: &'a mut S) -> Self {
        let baseline = session.steps().len();
        Self {
            config,
            oracle,
            session,
            baseline,
            trace: Vec::new(),
            recovery: Vec::new(),
            popped: 0,
            current: String::new(),
        }
    }

    /// Run the plan, escalating unrepaired errors as requested.
    pub fn run_plan(
        mut self,
        queue: PendingQueue,
        escalation: Escalation,
    ) -> Result<(Vec<ExecutedStep>, AttemptResult)> {
        let flow = self.execute(queue, escalation);
        self.finish(flow)
    }

    /// Try the oracle on the whole obligation; fall back to the plan.
    pub fn run_oracle_first(
        mut self,
        queue: PendingQueue,
    ) -> Result<(Vec<ExecutedStep>, AttemptResult)> {
        let flow = match self.oracle_first() {
            Ok(Some(script)) => Ok(script),
            Ok(None) => {
                debug!("oracle did not close the obligation, running the plan");
                self.execute(queue, Escalation::Oracle)
            }
            Err(halt) => Err(halt),
        };
        self.finish(flow)
    }

    fn executed(&self) -> Vec<String> {
        self.session
            .steps()
            .get(self.baseline..)
            .unwrap_or_default()
            .to_vec()
    }

    fn finish(self, flow: Flow<Vec<String>>) -> Result<(Vec<ExecutedStep>, AttemptResult)> {
        let failure = match flow {
            Ok(final_script) => {
                info!(steps = final_script.len(), "proof closed");
                return Ok((self.trace, AttemptResult::Success { final_script }));
            }
            Err(Halt::Restore(e)) => return Err(e),
            Err(Halt::Failed(failure)) => failure,
            Err(Halt::Session(e)) => {
                warn!(error = %e, step = %self.current, "session failure");
                ProofFailure::new(None, self.current.clone(), "")
            }
        };
        let failure = failure.with_partial_script(self.executed());
        info!(
            step = %failure.offending_step,
            message = %failure.error_message,
            "attempt failed"
        );
        rewind_to(self.session, self.baseline)?;
        Ok((self.trace, AttemptResult::Failure(failure)))
    }

    fn oracle_first(&mut self) -> Flow<Option<Vec<String>>> {
        let goals = self.session.current_goals()?;
        self.current = self.oracle.config().tactic.clone();
        let started = Instant::now();
        let mut record = ExecutedStep::new(
            self.current.clone(),
            StepOrigin::Oracle,
            goals.render_current(),
        );
        let verdict = self.oracle.invoke(&mut *self.session)?;
        record.record_oracle(verdict.suggestion());

        let OracleVerdict::Suggested(tactic) = verdict else {
            record.elapsed_ms = started.elapsed().as_millis() as u64;
            self.trace.push(record);
            return Ok(None);
        };
        let applied = self.session.append(&tactic);
        record.elapsed_ms = started.elapsed().as_millis() as u64;
        match applied {
            Ok(_) => self.trace.push(record.accepted()),
            Err(AppendError::Rejected { messages }) => {
                let message = messages.last().cloned().unwrap_or_default();
                self.trace.push(record.rejected(message));
                return Ok(None);
            }
            Err(AppendError::Transport(e)) => {
                self.trace.push(record);
                return Err(Halt::Session(e));
            }
        }

        match self.session.append(&self.config.closing_marker) {
            Ok(_) => Ok(Some(self.executed())),
            Err(AppendError::Rejected { .. }) => {
                rewind_to(&mut *self.session, self.baseline).map_err(Halt::Restore)?;
                Ok(None)
            }
            Err(AppendError::Transport(e)) => Err(Halt::Session(e)),
        }
    }

    fn charge_budget(&mut self, step: &str) -> Flow<()> {
        self.popped += 1;
        match self.config.max_steps {
            Some(max) if self.popped > max => {
                let goals = self.session.current_goals().ok();
                Err(Halt::failure(goals, step, BUDGET_EXHAUSTED))
            }
            _ => Ok(()),
        }
    }

    fn execute(&mut self, mut queue: PendingQueue, escalation: Escalation) -> Flow<Vec<String>> {
        let mut last_synthesis: Option<GoalState> = None;
        loop {
            while let Some(step) = queue.pop_front() {
                let short = step.short_text().to_string();
                self.charge_budget(&short)?;
                if self.config.is_placeholder(&short) || short == self.config.closing_marker {
                    debug!(step = %short, "skipping");
                    continue;
                }
                self.current = short.clone();
                self.run_step(&step, &mut queue, escalation)?;
                if self.session.can_close()? {
                    return self.close();
                }
            }

            let goals = self.session.current_goals()?;
            if !goals.focused_goals_done() || goals.stack.is_empty() {
                break;
            }
            if last_synthesis.as_ref() == Some(&goals) {
                warn!("focus steps changed nothing");
                break;
            }
            self.synthesize_focus(&goals, &mut queue);
            last_synthesis = Some(goals);
        }

        if self.session.can_close()? {
            return self.close();
        }
        if escalation == Escalation::Oracle {
            self.last_resort()?;
            if self.session.can_close()? {
                return self.close();
            }
        }
        let goals = self.session.current_goals().ok();
        Err(Halt::failure(
            goals,
            INCOMPLETE_PROOF_STEP,
            INCOMPLETE_PROOF_MESSAGE,
        ))
    }

    /// Apply one step, repairing or escalating if it is rejected.
    fn run_step(
        &mut self,
        step: &ProofStep,
        queue: &mut PendingQueue,
        escalation: Escalation,
    ) -> Flow<()> {
        let short = step.short_text();
        let before = self.session.current_goals()?;
        let started = Instant::now();
        let mut record = ExecutedStep::new(short, step.origin, before.render_current());

        let flow = match self.session.append(&step.text) {
            Ok(_) => {
                record = record.accepted();
                debug!(step = %short, origin = %step.origin, "applied");
                if step.origin == StepOrigin::Oracle {
                    self.check_progress(&before, short, &mut record)
                } else {
                    Ok(())
                }
            }
            Err(AppendError::Transport(e)) => Err(Halt::Session(e)),
            Err(AppendError::Rejected { messages }) => match messages.last() {
                None => {
                    debug!(step = %short, "rejected without diagnostics, skipping");
                    record = record.rejected("");
                    Ok(())
                }
                Some(message) => {
                    let message = message.clone();
                    debug!(step = %short, %message, "rejected");
                    record = record.rejected(message.clone());
                    if step.origin == StepOrigin::Oracle {
                        Err(Halt::failure(Some(before), short, message))
                    } else {
                        self.recover(&message, before, short, queue, escalation, &mut record)
                    }
                }
            },
        };
        record.elapsed_ms = started.elapsed().as_millis() as u64;
        self.trace.push(record);
        self.trace.append(&mut self.recovery);
        flow
    }

    /// Undo an oracle step that left the goal as it was.
    fn check_progress(
        &mut self,
        before: &GoalState,
        step: &str,
        record: &mut ExecutedStep,
    ) -> Flow<()> {
        let after = self.session.current_goals()?;
        if progress(before, &after) {
            return Ok(());
        }
        debug!(%step, "oracle step made no progress");
        self.session.undo_last()?;
        record.succeeded = false;
        record.error = Some(NO_PROGRESS.to_string());
        Err(Halt::failure(Some(before.clone()), step, NO_PROGRESS))
    }

    fn recover(
        &mut self,
        message: &str,
        before: GoalState,
        step: &str,
        queue: &mut PendingQueue,
        escalation: Escalation,
        record: &mut ExecutedStep,
    ) -> Flow<()> {
        if let Some(classified) = classify(message) {
            record.error_kind = Some(classified.kind);
            let ctx = RepairContext::new(
                self.session.can_close()?,
                self.session.steps().iter().map(String::as_str),
            );
            let outcome = repair(&classified, ctx, queue);
            record.repaired = outcome.applied();
            record.repair_conclusive = outcome.is_conclusive();
            if outcome.is_conclusive() {
                return Ok(());
            }
        }

        match escalation {
            Escalation::Oracle => {
                let verdict = self.oracle.invoke(&mut *self.session)?;
                record.record_oracle(verdict.suggestion());
                match verdict {
                    OracleVerdict::Suggested(tactic) => {
                        queue.push_front(ProofStep::synthesized(tactic, StepOrigin::Oracle));
                        Ok(())
                    }
                    OracleVerdict::Failed(_) => Err(Halt::failure(Some(before), step, message)),
                }
            }
            Escalation::Backtrack => {
                let floor = self.baseline;
                let report = backtrack(
                    &mut *self.session,
                    self.oracle,
                    queue,
                    floor,
                    &mut self.recovery,
                )?;
                debug!(
                    recovered = report.recovered,
                    oracle_calls = report.oracle_calls,
                    undone = report.undone,
                    "backtracking finished"
                );
                record.backtrack_succeeded = Some(report.recovered);
                if report.recovered {
                    Ok(())
                } else {
                    Err(Halt::failure(Some(before), step, message))
                }
            }
        }
    }

    /// Queue the steps that move focus to the goals left on the stack.
    fn synthesize_focus(&self, goals: &GoalState, queue: &mut PendingQueue) {
        let diagnostic = goals.focus.as_deref().unwrap_or_default();
        if let Some(bullet) = focus_next_bullet(diagnostic) {
            debug!(%bullet, count = goals.stack.len(), "focusing remaining goals");
            for _ in 0..goals.stack.len() {
                queue.push_front(ProofStep::synthesized(bullet.clone(), StepOrigin::Focus));
            }
        } else if focus_wants_unfocus(diagnostic) {
            debug!("closing brace block");
            queue.push_front(ProofStep::synthesized("}", StepOrigin::Focus));
        } else {
            let bullet =
                BulletStack::reconstruct(self.session.steps().iter().map(String::as_str)).fresh();
            warn!(%bullet, "goals left on the stack without a focus diagnostic");
            for _ in 0..goals.stack.len() {
                queue.push_front(ProofStep::synthesized(bullet.clone(), StepOrigin::Focus));
            }
        }
    }

    /// One more oracle call once the plan is exhausted.
    fn last_resort(&mut self) -> Flow<()> {
        let goals = self.session.current_goals()?;
        self.current = LAST_RESORT_STEP.to_string();
        let started = Instant::now();
        let mut record =
            ExecutedStep::new(LAST_RESORT_STEP, StepOrigin::Oracle, goals.render_current());
        let verdict = self.oracle.invoke(&mut *self.session)?;
        record.record_oracle(verdict.suggestion());

        let mut flow = Ok(());
        if let OracleVerdict::Suggested(tactic) = verdict {
            match self.session.append(&tactic) {
                Ok(_) => record = record.accepted(),
                Err(AppendError::Rejected { messages }) => {
                    record = record.rejected(messages.last().cloned().unwrap_or_default());
                }
                Err(AppendError::Transport(e)) => flow = Err(Halt::Session(e)),
            }
        }
        record.elapsed_ms = started.elapsed().as_millis() as u64;
        self.trace.push(record);
        flow
    }

    fn close(&mut self) -> Flow<Vec<String>> {
        self.current = self.config.closing_marker.clone();
        match self.session.append(&self.config.closing_marker) {
            Ok(_) => Ok(self.executed()),
            Err(AppendError::Transport(e)) => Err(Halt::Session(e)),
            Err(AppendError::Rejected { messages }) => {
                let message = messages
                    .last()
                    .cloned()
                    .unwrap_or_else(|| INCOMPLETE_PROOF_MESSAGE.to_string());
                let goals = self.session.current_goals().ok();
                Err(Halt::failure(goals, INCOMPLETE_PROOF_STEP, message))
            }
        }
    }
}
