//! In-process stand-in for a proof assistant, used by the engine tests.
//!
//! Models the parts of the assistant the engine relies on: strict bullets,
//! brace focusing, a table of tactics with their effect on the focused goal,
//! the `hammer.` automation, and a closing marker. Messages follow the shapes
//! the real assistant prints.

use std::collections::HashMap;

use crate::engine::bullets::is_bullet;
use crate::error::{Error, Result};
use crate::session::types::{Goal, GoalState, StackFrame};
use crate::session::{AppendError, ProofSession, StepReply};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Opener {
    Bullet(String),
    Brace,
}

#[derive(Debug, Clone)]
struct Frame {
    opener: Opener,
    rest: Vec<Goal>,
}

#[derive(Debug, Clone, Default)]
struct Machine {
    focused: Vec<Goal>,
    frames: Vec<Frame>,
    closed: bool,
}

impl Machine {
    /// Drop bullet levels whose goals are all done, innermost first.
    fn unwind_finished(&mut self) {
        while self.focused.is_empty() {
            match self.frames.last() {
                Some(Frame {
                    opener: Opener::Bullet(_),
                    rest,
                }) if rest.is_empty() => {
                    self.frames.pop();
                }
                _ => break,
            }
        }
    }

    fn no_goal_message(&self) -> String {
        let mut probe = self.clone();
        probe.unwind_finished();
        match probe.frames.last() {
            Some(Frame {
                opener: Opener::Bullet(b),
                rest,
            }) if !rest.is_empty() => format!("No such goal. Focus next goal with bullet {}.", b),
            _ => "No such goal.".to_string(),
        }
    }

    fn focus_message(&self) -> Option<String> {
        if !self.focused.is_empty() {
            return None;
        }
        let mut probe = self.clone();
        probe.unwind_finished();
        match probe.frames.last() {
            Some(Frame {
                opener: Opener::Bullet(b),
                rest,
            }) if !rest.is_empty() => Some(format!("Focus next goal with bullet {}.", b)),
            Some(Frame {
                opener: Opener::Brace,
                ..
            }) => Some("Try unfocusing with \"}\".".to_string()),
            _ => None,
        }
    }

    fn can_close(&self) -> bool {
        !self.closed
            && self.focused.is_empty()
            && self
                .frames
                .iter()
                .all(|f| f.rest.is_empty() && f.opener != Opener::Brace)
    }

    fn innermost_bullet(&self) -> Option<&str> {
        self.frames.iter().rev().find_map(|f| match &f.opener {
            Opener::Bullet(b) => Some(b.as_str()),
            Opener::Brace => None,
        })
    }

    fn bullet(&mut self, b: &str) -> std::result::Result<(), String> {
        if !self.focused.is_empty() {
            let active = self
                .frames
                .iter()
                .any(|f| f.opener == Opener::Bullet(b.to_string()));
            if active {
                let current = self.innermost_bullet().unwrap_or(b).to_string();
                return Err(format!(
                    "Wrong bullet {}: Current bullet {} is not finished.",
                    b, current
                ));
            }
            let rest = self.focused.split_off(1);
            self.frames.push(Frame {
                opener: Opener::Bullet(b.to_string()),
                rest,
            });
            return Ok(());
        }

        let depth = self.frames.len();
        self.unwind_finished();
        match self.frames.last_mut() {
            Some(Frame {
                opener: Opener::Bullet(top),
                rest,
            }) if top.as_str() == b && !rest.is_empty() => {
                let next = rest.remove(0);
                self.focused.push(next);
                Ok(())
            }
            Some(Frame {
                opener: Opener::Bullet(top),
                ..
            }) => Err(format!("Wrong bullet {}: Expecting {}.", b, top)),
            Some(Frame {
                opener: Opener::Brace,
                ..
            }) => Err(format!("Wrong bullet {}: Try unfocusing with \"}}\".", b)),
            None if depth > 1 => Err(format!("Wrong bullet {}: No more subgoals.", b)),
            None => Err(format!("Wrong bullet {}: No more goals.", b)),
        }
    }

    fn open_brace(&mut self) -> std::result::Result<(), String> {
        if self.focused.is_empty() {
            return Err(self.no_goal_message());
        }
        let rest = self.focused.split_off(1);
        self.frames.push(Frame {
            opener: Opener::Brace,
            rest,
        });
        Ok(())
    }

    fn close_brace(&mut self) -> std::result::Result<(), String> {
        if self.focused.is_empty() {
            self.unwind_finished();
            if let Some(Frame {
                opener: Opener::Brace,
                ..
            }) = self.frames.last()
            {
                if let Some(frame) = self.frames.pop() {
                    self.focused = frame.rest;
                }
                return Ok(());
            }
        }
        Err("This proof is focused, but cannot be unfocused this way.".to_string())
    }
}

#[derive(Debug, Clone)]
struct TacticRule {
    /// Only applies when the focused conclusion equals this.
    on: Option<String>,
    /// Subgoals replacing the focused goal (empty closes it).
    produces: Vec<Goal>,
}

/// Simulated session over one obligation.
#[derive(Debug, Clone)]
pub(crate) struct SimSession {
    machine: Machine,
    snapshots: Vec<Machine>,
    history: Vec<String>,
    tactics: HashMap<String, Vec<TacticRule>>,
    hammer: HashMap<String, String>,
    hammer_no_prefix: bool,
    transport_failure: Option<String>,
    /// Every text passed to `append`, accepted or not.
    pub(crate) attempts: Vec<String>,
}

impl SimSession {
    pub(crate) fn new(conclusion: &str) -> Self {
        Self {
            machine: Machine {
                focused: vec![Goal::new(conclusion)],
                ..Default::default()
            },
            snapshots: Vec::new(),
            history: Vec::new(),
            tactics: HashMap::new(),
            hammer: HashMap::new(),
            hammer_no_prefix: false,
            transport_failure: None,
            attempts: Vec::new(),
        }
    }

    /// A tactic that applies to any goal.
    pub(crate) fn with_tactic(mut self, tactic: &str, produces: &[&str]) -> Self {
        self.tactics
            .entry(tactic.to_string())
            .or_default()
            .push(TacticRule {
                on: None,
                produces: produces.iter().map(|g| Goal::new(*g)).collect(),
            });
        self
    }

    /// A tactic that applies only to goals with the given conclusion.
    pub(crate) fn with_tactic_on(mut self, tactic: &str, on: &str, produces: &[&str]) -> Self {
        self.tactics
            .entry(tactic.to_string())
            .or_default()
            .push(TacticRule {
                on: Some(on.to_string()),
                produces: produces.iter().map(|g| Goal::new(*g)).collect(),
            });
        self
    }

    /// Let `hammer.` solve goals with this conclusion by suggesting `tactic`.
    ///
    /// The suggested tactic still has to be registered to be applicable.
    pub(crate) fn with_hammer(mut self, on: &str, tactic: &str) -> Self {
        self.hammer.insert(on.to_string(), tactic.to_string());
        self
    }

    /// Make `hammer.` answer without the replacement prefix.
    pub(crate) fn with_garbled_hammer(mut self) -> Self {
        self.hammer_no_prefix = true;
        self
    }

    /// Fail the transport once, on the first append of `step`.
    pub(crate) fn with_transport_failure_on(mut self, step: &str) -> Self {
        self.transport_failure = Some(step.to_string());
        self
    }

    /// Number of times the hammer was invoked.
    pub(crate) fn hammer_calls(&self) -> usize {
        self.attempts.iter().filter(|a| a.trim() == "hammer.").count()
    }

    fn commit(&mut self, before: Machine, step: &str) {
        self.snapshots.push(before);
        self.history.push(step.to_string());
    }

    fn apply_tactic(&mut self, step: &str) -> std::result::Result<(), String> {
        let Some(goal) = self.machine.focused.first().cloned() else {
            return Err(self.machine.no_goal_message());
        };
        let rule = self.tactics.get(step).and_then(|rules| {
            rules
                .iter()
                .find(|r| r.on.as_deref().map_or(true, |on| on == goal.conclusion))
        });
        match rule {
            Some(rule) => {
                let produced = rule.produces.clone();
                self.machine.focused.splice(0..1, produced);
                Ok(())
            }
            None if self.tactics.contains_key(step) => {
                Err(format!("Unable to apply {} to {}.", step, goal.conclusion))
            }
            None => Err(format!(
                "The reference {} was not found in the current environment.",
                step.trim_end_matches('.')
            )),
        }
    }
}

impl ProofSession for SimSession {
    fn append(&mut self, text: &str) -> std::result::Result<StepReply, AppendError> {
        let step = text.trim().to_string();
        self.attempts.push(step.clone());

        if self.transport_failure.as_deref() == Some(step.as_str()) {
            self.transport_failure = None;
            return Err(AppendError::Transport(Error::SubprocessComm(
                "simulated connection reset".to_string(),
            )));
        }
        if self.machine.closed {
            return Err(AppendError::rejected("No proof is in progress."));
        }

        let before = self.machine.clone();

        if step == "Qed." {
            if !self.machine.can_close() {
                return Err(AppendError::rejected(
                    "Attempt to save an incomplete proof",
                ));
            }
            self.machine.closed = true;
            self.commit(before, &step);
            return Ok(StepReply::default());
        }

        if step == "hammer." {
            let Some(goal) = self.machine.focused.first() else {
                return Err(AppendError::rejected(self.machine.no_goal_message()));
            };
            let Some(suggestion) = self.hammer.get(&goal.conclusion).cloned() else {
                return Err(AppendError::rejected("Hammer failed: proof reconstruction failed"));
            };
            // Hammer closes the goal in the assistant; the suggestion replaces it.
            self.machine.focused.remove(0);
            self.commit(before, &step);
            let message = if self.hammer_no_prefix {
                suggestion
            } else {
                format!("Replace the hammer tactic with: {}", suggestion)
            };
            return Ok(StepReply::with_messages([message]));
        }

        let result = if is_bullet(&step) {
            self.machine.bullet(&step)
        } else if step == "}" {
            self.machine.close_brace()
        } else if step.ends_with('{') {
            self.machine.open_brace()
        } else {
            self.apply_tactic(&step)
        };

        match result {
            Ok(()) => {
                self.commit(before, &step);
                Ok(StepReply::default())
            }
            Err(message) => {
                self.machine = before;
                Err(AppendError::rejected(message))
            }
        }
    }

    fn undo_last(&mut self) -> Result<()> {
        let machine = self
            .snapshots
            .pop()
            .ok_or_else(|| Error::Internal("nothing to undo".to_string()))?;
        self.machine = machine;
        self.history.pop();
        Ok(())
    }

    fn current_goals(&mut self) -> Result<GoalState> {
        Ok(GoalState {
            goals: self.machine.focused.clone(),
            stack: self
                .machine
                .frames
                .iter()
                .map(|f| StackFrame {
                    before: Vec::new(),
                    after: f.rest.clone(),
                })
                .collect(),
            focus: self.machine.focus_message(),
        })
    }

    fn can_close(&mut self) -> Result<bool> {
        Ok(self.machine.can_close())
    }

    fn steps(&self) -> &[String] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn induction_session() -> SimSession {
        SimSession::new("P n")
            .with_tactic("induction n.", &["P 0", "P (S n)"])
            .with_tactic_on("reflexivity.", "P 0", &[])
            .with_tactic_on("auto.", "P (S n)", &[])
    }

    #[test]
    fn test_bullets_focus_siblings() {
        let mut s = induction_session();
        for step in ["induction n.", "-", "reflexivity.", "-", "auto.", "Qed."] {
            s.append(step).unwrap();
        }
        assert_eq!(s.steps().len(), 6);
    }

    #[test]
    fn test_next_goal_diagnostics() {
        let mut s = induction_session();
        for step in ["induction n.", "-", "reflexivity."] {
            s.append(step).unwrap();
        }
        let goals = s.current_goals().unwrap();
        assert!(goals.goals.is_empty());
        assert_eq!(goals.focus.as_deref(), Some("Focus next goal with bullet -."));

        let err = s.append("auto.").unwrap_err();
        assert_eq!(
            err.message(),
            Some("No such goal. Focus next goal with bullet -.")
        );

        let err = s.append("+").unwrap_err();
        assert_eq!(err.message(), Some("Wrong bullet +: Expecting -."));
    }

    #[test]
    fn test_unfinished_bullet() {
        let mut s = induction_session();
        for step in ["induction n.", "-"] {
            s.append(step).unwrap();
        }
        let err = s.append("-").unwrap_err();
        assert_eq!(
            err.message(),
            Some("Wrong bullet -: Current bullet - is not finished.")
        );
    }

    #[test]
    fn test_braces() {
        let mut s = induction_session();
        for step in ["induction n.", "{", "reflexivity."] {
            s.append(step).unwrap();
        }
        assert_eq!(
            s.current_goals().unwrap().focus.as_deref(),
            Some("Try unfocusing with \"}\".")
        );
        s.append("}").unwrap();
        assert_eq!(s.current_goals().unwrap().goals.len(), 1);
    }

    #[test]
    fn test_undo_restores_machine() {
        let mut s = induction_session();
        s.append("induction n.").unwrap();
        s.undo_last().unwrap();
        assert!(s.steps().is_empty());
        assert_eq!(s.current_goals().unwrap().goals, vec![Goal::new("P n")]);
        assert!(s.undo_last().is_err());
    }

    #[test]
    fn test_hammer_reply() {
        let mut s = SimSession::new("P").with_hammer("P", "sauto.");
        let reply = s.append("hammer.").unwrap();
        assert_eq!(
            reply.last_message(),
            Some("Replace the hammer tactic with: sauto.")
        );
        assert_eq!(s.hammer_calls(), 1);
    }
}
