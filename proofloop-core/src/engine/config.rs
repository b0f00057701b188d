//! Engine configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How an attempt is driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofMethod {
    /// Run the plan, falling back to the oracle when a step cannot be repaired.
    #[serde(rename = "dsp")]
    Plan,
    /// Try the oracle on the whole obligation first, then run the plan.
    #[default]
    #[serde(rename = "hammer_dsp")]
    OracleFirst,
    /// Run the plan, backtracking through executed steps when stuck.
    #[serde(rename = "palm")]
    Backtrack,
}

impl ProofMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "dsp",
            Self::OracleFirst => "hammer_dsp",
            Self::Backtrack => "palm",
        }
    }
}

impl fmt::Display for ProofMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dsp" => Ok(Self::Plan),
            "hammer_dsp" => Ok(Self::OracleFirst),
            "palm" => Ok(Self::Backtrack),
            other => Err(Error::Config(format!("unknown proof method: {}", other))),
        }
    }
}

/// A textual substitution applied to oracle suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub from: String,
    pub to: String,
}

impl Rewrite {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Configuration of the automation oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Tactic that invokes the oracle.
    pub tactic: String,

    /// Prefix of the reply that carries the suggested tactic.
    pub reply_prefix: String,

    /// Substitutions applied to every suggestion, in order.
    pub rewrites: Vec<Rewrite>,

    /// Tactic names the oracle suggests; backtracking peels these off.
    pub automation_tactics: Vec<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            tactic: "hammer.".to_string(),
            reply_prefix: "Replace the hammer tactic with:".to_string(),
            // srun eauto is unreliable on replay
            rewrites: vec![Rewrite::new("srun eauto ", "best ")],
            automation_tactics: [
                "srun",
                "sinit",
                "sauto",
                "sintuition",
                "ssimpl",
                "qsimpl",
                "scrush",
                "fcrush",
                "ecrush",
                "sblast",
                "qblast",
                "scongruence",
                "sfirstorder",
                "strivial",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl OracleConfig {
    /// Whether `step` is an invocation of one of the automation tactics.
    pub fn is_automation_tactic(&self, step: &str) -> bool {
        let step = step.trim();
        self.automation_tactics.iter().any(|name| {
            step.strip_prefix(name.as_str())
                .is_some_and(|rest| rest.starts_with(' ') || rest == ".")
        })
    }
}

/// Configuration of the proof engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Policy used by `ProofEngine::prove`.
    pub method: ProofMethod,

    /// Step that ends a finished proof.
    pub closing_marker: String,

    /// Steps that stand in for missing proof text and are never executed.
    pub placeholder_markers: Vec<String>,

    /// Automation oracle.
    pub oracle: OracleConfig,

    /// Upper bound on the number of queue entries one attempt may pop.
    pub max_steps: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            method: ProofMethod::default(),
            closing_marker: "Qed.".to_string(),
            placeholder_markers: vec!["admit.".to_string(), "Admitted.".to_string()],
            oracle: OracleConfig::default(),
            max_steps: None,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_method(mut self, method: ProofMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_closing_marker(mut self, marker: impl Into<String>) -> Self {
        self.closing_marker = marker.into();
        self
    }

    pub fn with_oracle(mut self, oracle: OracleConfig) -> Self {
        self.oracle = oracle;
        self
    }

    /// Cap the number of steps one attempt may pop.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Whether `text` is a placeholder that must be skipped.
    pub fn is_placeholder(&self, text: &str) -> bool {
        self.placeholder_markers.iter().any(|m| m == text)
    }
}
