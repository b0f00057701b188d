//! Local repairs for structural errors.
//!
//! Each repair is a pure transformation of the pending queue, decided from
//! the classified diagnostic and two facts about the session. Nothing here
//! touches the session.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::classify::{Classified, ErrorKind};
use super::queue::PendingQueue;
use super::step::{ProofStep, StepOrigin};

/// What a repair did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repair {
    /// The queue was fixed up; carry on with the plan.
    Conclusive,
    /// The queue was fixed up, but the fix is not trusted on its own and the
    /// oracle must be consulted.
    Inconclusive,
    /// No repair applies.
    NoRepair,
}

impl Repair {
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Conclusive)
    }

    pub fn applied(&self) -> bool {
        !matches!(self, Self::NoRepair)
    }
}

/// Session facts a repair may depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairContext {
    /// The obligation can be closed right now.
    pub closable: bool,
    /// Some executed step opened a brace block.
    pub has_open_brace: bool,
}

impl RepairContext {
    /// Gather the context from the executed steps and closability.
    pub fn new<'a, I>(closable: bool, executed: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            closable,
            has_open_brace: executed.into_iter().any(|s| s.trim_end().ends_with('{')),
        }
    }
}

fn push_marker(queue: &mut PendingQueue, marker: Option<&str>) -> bool {
    match marker {
        Some(marker) if !marker.is_empty() => {
            queue.push_front(ProofStep::synthesized(marker, StepOrigin::Repair));
            true
        }
        _ => false,
    }
}

/// Apply the repair for `classified` to `queue`.
pub fn repair(classified: &Classified, ctx: RepairContext, queue: &mut PendingQueue) -> Repair {
    let outcome = match classified.kind {
        ErrorKind::UnfinishedBullet => {
            if push_marker(queue, classified.capture(2)) {
                Repair::Inconclusive
            } else {
                Repair::NoRepair
            }
        }
        ErrorKind::WrongBullet | ErrorKind::WrongBulletUnfocus => {
            if push_marker(queue, classified.capture(2)) {
                Repair::Conclusive
            } else {
                Repair::NoRepair
            }
        }
        ErrorKind::NoMoreGoals | ErrorKind::NoMoreSubgoals => {
            if !ctx.closable {
                warn!(kind = %classified.kind, "goals exhausted but obligation is not closable");
            }
            queue.clear();
            Repair::Conclusive
        }
        ErrorKind::NextGoal => match classified.capture(1) {
            Some(marker) if !marker.is_empty() => {
                let dropped = queue.drop_until(marker);
                debug!(marker, dropped, "skipping to next goal");
                Repair::Conclusive
            }
            _ => Repair::NoRepair,
        },
        ErrorKind::NoGoal => {
            if ctx.closable {
                queue.clear();
            } else if ctx.has_open_brace {
                push_marker(queue, Some("}"));
            }
            Repair::Conclusive
        }
        ErrorKind::UsedVariable | ErrorKind::NoProduct => Repair::NoRepair,
    };
    debug!(kind = %classified.kind, ?outcome, pending = queue.len(), "repair");
    outcome
}
