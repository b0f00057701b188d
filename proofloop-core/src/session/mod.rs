//! The session interface the engine drives.
//!
//! A session is a stateful handle to one open proof obligation inside a
//! proof assistant. The engine only ever needs five things from it: append a
//! step, undo the most recent step, read the goals, ask whether the proof can
//! be closed, and list the steps currently executed.
//!
//! ## Components
//!
//! - **types**: goal snapshots (`Goal`, `Hypothesis`, `GoalState`)
//! - **bridge**: a session backed by a JSON-lines helper process

pub mod bridge;
#[cfg(test)]
pub(crate) mod sim;
pub mod types;

pub use bridge::{BridgeConfig, BridgeSession};
pub use types::{Goal, GoalState, Hypothesis, StackFrame};

use crate::error::{Error, Result};
use thiserror::Error as ThisError;

/// Messages the assistant attached to a step it accepted.
///
/// For the automation oracle the last message carries the suggested
/// replacement tactic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReply {
    /// Diagnostics attached to the accepted step, in order.
    pub messages: Vec<String>,
}

impl StepReply {
    /// Create a reply carrying the given messages.
    pub fn with_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// The last (authoritative) message, if any.
    pub fn last_message(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }
}

/// Why a step could not be appended.
#[derive(ThisError, Debug)]
pub enum AppendError {
    /// The assistant rejected the step. The session is unchanged.
    #[error("step rejected: {}", .messages.last().map(String::as_str).unwrap_or("<no diagnostics>"))]
    Rejected {
        /// Diagnostics, the last one authoritative.
        messages: Vec<String>,
    },

    /// The binding itself failed.
    #[error(transparent)]
    Transport(#[from] Error),
}

impl AppendError {
    /// Create a rejection carrying a single diagnostic.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            messages: vec![message.into()],
        }
    }

    /// The authoritative diagnostic of a rejection.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Rejected { messages } => messages.last().map(String::as_str),
            Self::Transport(_) => None,
        }
    }
}

/// A live proof obligation in a proof assistant.
///
/// Implementations own their connection; the engine holds `&mut` for the
/// whole of an attempt, so two attempts can never interleave on one session.
pub trait ProofSession {
    /// Append one step at the end of the proof.
    ///
    /// On `Rejected` the session must be left exactly as it was.
    fn append(&mut self, text: &str) -> std::result::Result<StepReply, AppendError>;

    /// Undo the most recently appended step.
    fn undo_last(&mut self) -> Result<()>;

    /// Read the goal state at the current end of the proof.
    fn current_goals(&mut self) -> Result<GoalState>;

    /// Whether the proof can be closed right now.
    fn can_close(&mut self) -> Result<bool>;

    /// Canonical text of every step currently executed, oldest first.
    fn steps(&self) -> &[String];
}

impl<S: ProofSession + ?Sized> ProofSession for &mut S {
    fn append(&mut self, text: &str) -> std::result::Result<StepReply, AppendError> {
        (**self).append(text)
    }

    fn undo_last(&mut self) -> Result<()> {
        (**self).undo_last()
    }

    fn current_goals(&mut self) -> Result<GoalState> {
        (**self).current_goals()
    }

    fn can_close(&mut self) -> Result<bool> {
        (**self).can_close()
    }

    fn steps(&self) -> &[String] {
        (**self).steps()
    }
}

/// Undo steps until the session holds exactly `depth` executed steps.
pub fn rewind_to<S: ProofSession + ?Sized>(session: &mut S, depth: usize) -> Result<()> {
    while session.steps().len() > depth {
        let before = session.steps().len();
        if let Err(e) = session.undo_last() {
            return Err(Error::restore_failed_with_source(depth, before, e));
        }
        if session.steps().len() >= before {
            return Err(Error::restore_failed(depth, session.steps().len()));
        }
    }
    Ok(())
}
