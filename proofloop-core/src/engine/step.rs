//! Proof steps as the engine sees them.

use serde::{Deserialize, Serialize};

/// Where a step came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOrigin {
    /// Part of the script supplied by the caller.
    Plan,
    /// Injected by a local repair (a corrective bullet or brace).
    Repair,
    /// Suggested by the automation oracle.
    Oracle,
    /// Synthesized to focus goals left on the stack.
    Focus,
}

impl std::fmt::Display for StepOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Repair => write!(f, "repair"),
            Self::Oracle => write!(f, "oracle"),
            Self::Focus => write!(f, "focus"),
        }
    }
}

/// One atomic step of a proof script.
///
/// `text` is what gets sent to the assistant and may carry leading layout;
/// `short` is the canonical form used for comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Text appended to the session.
    pub text: String,
    /// Canonical form, when it differs from the trimmed text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    /// Where the step came from.
    pub origin: StepOrigin,
}

impl ProofStep {
    /// A step from the caller's script.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            short: None,
            origin: StepOrigin::Plan,
        }
    }

    /// A step from the caller's script with an explicit canonical form.
    pub fn with_short(text: impl Into<String>, short: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            short: Some(short.into()),
            origin: StepOrigin::Plan,
        }
    }

    /// A step the engine made up, placed on its own line.
    pub fn synthesized(marker: impl Into<String>, origin: StepOrigin) -> Self {
        let marker = marker.into();
        Self {
            text: format!("\n{}", marker),
            short: Some(marker),
            origin,
        }
    }

    /// Canonical text of the step.
    pub fn short_text(&self) -> &str {
        match &self.short {
            Some(short) => short.as_str(),
            None => self.text.trim(),
        }
    }

    /// Whether the step's canonical text is `marker`.
    pub fn is(&self, marker: &str) -> bool {
        self.short_text() == marker
    }
}

impl From<&str> for ProofStep {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for ProofStep {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
