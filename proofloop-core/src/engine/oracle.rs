//! Automation oracle adapter.
//!
//! The oracle is the assistant's built-in hammer. It is run as a probe: the
//! `hammer.` step is appended, its reply read, and the step undone again, so
//! the session is left as it was whatever the outcome. A successful reply
//! names a replacement tactic, which is what the engine actually executes.

use tracing::debug;

use super::config::OracleConfig;
use crate::error::Result;
use crate::session::{AppendError, ProofSession};

/// Answer of one oracle probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleVerdict {
    /// The oracle solved the goal; run this tactic instead.
    Suggested(String),
    /// The oracle gave up, with its last diagnostic.
    Failed(String),
}

impl OracleVerdict {
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Suggested(tactic) => Some(tactic),
            Self::Failed(_) => None,
        }
    }
}

/// Message reported when the oracle's reply lacks the expected prefix.
pub const UNEXPECTED_REPLY: &str = "unexpected oracle reply";

/// The hammer, driven through a session.
#[derive(Debug, Clone, Default)]
pub struct HammerOracle {
    config: OracleConfig,
}

impl HammerOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Probe the oracle on the current goal.
    ///
    /// Rejections come back as [`OracleVerdict::Failed`]; only transport
    /// failures (or a failing undo) are errors.
    pub fn invoke<S: ProofSession + ?Sized>(&self, session: &mut S) -> Result<OracleVerdict> {
        let reply = match session.append(&self.config.tactic) {
            Ok(reply) => reply,
            Err(AppendError::Rejected { messages }) => {
                let message = messages.last().cloned().unwrap_or_default();
                debug!(%message, "oracle failed");
                return Ok(OracleVerdict::Failed(message));
            }
            Err(AppendError::Transport(e)) => return Err(e),
        };
        let message = reply.last_message().unwrap_or_default().to_string();
        session.undo_last()?;

        match self.parse_suggestion(&message) {
            Some(tactic) => {
                debug!(%tactic, "oracle suggestion");
                Ok(OracleVerdict::Suggested(tactic))
            }
            None => {
                debug!(%message, "oracle reply without suggestion");
                Ok(OracleVerdict::Failed(UNEXPECTED_REPLY.to_string()))
            }
        }
    }

    /// Extract the replacement tactic from an oracle reply.
    pub fn parse_suggestion(&self, message: &str) -> Option<String> {
        let rest = message.trim().strip_prefix(self.config.reply_prefix.as_str())?;
        let mut tactic = rest.trim().to_string();
        for rewrite in &self.config.rewrites {
            if let Some(tail) = tactic.strip_prefix(rewrite.from.as_str()) {
                tactic = format!("{}{}", rewrite.to, tail);
            }
        }
        let tactic = tactic.trim();
        if tactic.is_empty() {
            return None;
        }
        if tactic.ends_with('.') {
            Some(tactic.to_string())
        } else {
            Some(format!("{}.", tactic))
        }
    }

    /// Whether `step` is one of the tactics the oracle suggests.
    pub fn is_automation_tactic(&self, step: &str) -> bool {
        self.config.is_automation_tactic(step)
    }
}
