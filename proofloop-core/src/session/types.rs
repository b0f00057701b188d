//! Goal snapshots exposed by a proof session.
//!
//! These types mirror what an LSP-backed proof assistant reports for the
//! current position in a proof: the focused goals, the stack of goals hidden
//! by bullets and braces, and an optional message describing how to focus the
//! next one.

use serde::{Deserialize, Serialize};

/// A hypothesis in a proof goal.
///
/// One line of the local context may bind several names to the same type
/// (`x y : nat`), so names are a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Names bound by this hypothesis.
    pub names: Vec<String>,
    /// Type of the hypothesis.
    pub ty: String,
}

impl Hypothesis {
    /// Create a hypothesis binding a single name.
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            ty: ty.into(),
        }
    }

    /// Create a hypothesis binding several names to one type.
    pub fn with_names<I, S>(names: I, ty: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ty: ty.into(),
        }
    }
}

/// A proof goal: local hypotheses and the conclusion to prove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Local hypotheses available.
    #[serde(default, rename = "hyps")]
    pub hypotheses: Vec<Hypothesis>,
    /// Conclusion to prove.
    #[serde(rename = "ty")]
    pub conclusion: String,
}

impl Goal {
    /// Create a goal without hypotheses.
    pub fn new(conclusion: impl Into<String>) -> Self {
        Self {
            hypotheses: Vec::new(),
            conclusion: conclusion.into(),
        }
    }

    /// Add a hypothesis to the goal.
    pub fn with_hypothesis(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.hypotheses.push(Hypothesis::new(name, ty));
        self
    }

    /// Render the goal the way it is shown to a human or a model.
    pub fn render(&self) -> String {
        let mut hypotheses = String::new();
        for hyp in &self.hypotheses {
            hypotheses.push_str(&format!("{} : {}\n", hyp.names.join(", "), hyp.ty));
        }
        format!(
            "(* Hypotheses: *)\n{}\n\n(* Goal: *)\n{}",
            hypotheses, self.conclusion
        )
    }
}

/// Goals hidden by one focusing level (a bullet or a brace).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Goals preceding the focused ones at this level.
    #[serde(default)]
    pub before: Vec<Goal>,
    /// Goals following the focused ones at this level.
    #[serde(default)]
    pub after: Vec<Goal>,
}

/// Snapshot of the goal state at one instant of a session.
///
/// A snapshot is only meaningful for the session position it was read from;
/// read a fresh one after every change to the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalState {
    /// Currently focused goals.
    #[serde(default)]
    pub goals: Vec<Goal>,
    /// Unfocused goals, innermost level last.
    #[serde(default)]
    pub stack: Vec<StackFrame>,
    /// Focus diagnostic, e.g. `Focus next goal with bullet -.`
    #[serde(default, rename = "bullet")]
    pub focus: Option<String>,
}

impl GoalState {
    /// Create a state with the given focused goals and nothing unfocused.
    pub fn focused(goals: Vec<Goal>) -> Self {
        Self {
            goals,
            stack: Vec::new(),
            focus: None,
        }
    }

    /// The goal subsequent steps apply to, if any.
    pub fn current(&self) -> Option<&Goal> {
        self.goals.first()
    }

    /// Whether the focused goal list is exhausted.
    pub fn focused_goals_done(&self) -> bool {
        self.goals.is_empty()
    }

    /// Render the current goal, or a marker when it is finished.
    pub fn render_current(&self) -> String {
        match self.current() {
            Some(goal) => goal.render(),
            None => "current goal completed".to_string(),
        }
    }
}
