//! Structural error classification.
//!
//! The assistant reports bullet and focus problems as free text. The table
//! below maps those messages to a closed set of kinds; supporting a new
//! message shape means adding a row, not new control flow.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kinds of structural error the engine recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// `Wrong bullet X: Current bullet Y is not finished.`
    UnfinishedBullet,
    /// `Wrong bullet X: Expecting Y.`
    WrongBullet,
    /// `Wrong bullet X: Try unfocusing with "Y".`
    WrongBulletUnfocus,
    /// `Wrong bullet X: No more goals.`
    NoMoreGoals,
    /// `Wrong bullet X: No more subgoals.`
    NoMoreSubgoals,
    /// `No such goal. Focus next goal with bullet X.`
    NextGoal,
    /// `No such goal.`
    NoGoal,
    /// `X is already used.` / `X is used twice.`
    UsedVariable,
    /// `No product even after head-reduction.`
    NoProduct,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnfinishedBullet => "unfinished-bullet",
            Self::WrongBullet => "wrong-bullet",
            Self::WrongBulletUnfocus => "wrong-bullet-needs-unfocus",
            Self::NoMoreGoals => "no-more-goals",
            Self::NoMoreSubgoals => "no-more-subgoals",
            Self::NextGoal => "next-goal",
            Self::NoGoal => "no-goal",
            Self::UsedVariable => "used-variable",
            Self::NoProduct => "no-product",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static UNFINISHED_BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Wrong bullet (.*?): Current bullet (.*?) is not finished").expect("valid regex")
});

static WRONG_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Wrong bullet (.*?): Expecting (.*?)\.").expect("valid regex"));

static WRONG_BULLET_UNFOCUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Wrong bullet (.*?): Try unfocusing with "(.*?)"\."#).expect("valid regex")
});

static NO_MORE_GOALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Wrong bullet (.*?): No more goals").expect("valid regex"));

static NO_MORE_SUBGOALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Wrong bullet (.*?): No more subgoals").expect("valid regex"));

static NEXT_GOAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"No such goal\. Focus next goal with bullet (.*?)\.").expect("valid regex")
});

static NO_GOAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"No such goal").expect("valid regex"));

static USED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.*?) is ((already used)|(used twice))").expect("valid regex")
});

static NO_PRODUCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"No product even after head-reduction").expect("valid regex")
});

/// Focus diagnostic naming the next bullet, as found in a goal state.
pub(crate) static FOCUS_NEXT_BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Focus next goal with bullet (.*?)\.").expect("valid regex")
});

/// Focus diagnostic asking for the brace block to be closed.
pub(crate) static FOCUS_UNFOCUS_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Try unfocusing with "\}"\."#).expect("valid regex"));

/// Priority order. The bullet shapes come first, `NextGoal` before its
/// weaker `NoGoal` prefix, and the two unrepaired kinds last.
static TABLE: [(ErrorKind, &LazyLock<Regex>); 9] = [
    (ErrorKind::UnfinishedBullet, &UNFINISHED_BULLET),
    (ErrorKind::WrongBullet, &WRONG_BULLET),
    (ErrorKind::WrongBulletUnfocus, &WRONG_BULLET_UNFOCUS),
    (ErrorKind::NoMoreGoals, &NO_MORE_GOALS),
    (ErrorKind::NoMoreSubgoals, &NO_MORE_SUBGOALS),
    (ErrorKind::NextGoal, &NEXT_GOAL),
    (ErrorKind::NoGoal, &NO_GOAL),
    (ErrorKind::UsedVariable, &USED_VAR),
    (ErrorKind::NoProduct, &NO_PRODUCT),
];

/// A message matched against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: ErrorKind,
    /// Capture groups of the matching pattern, in order.
    pub captures: Vec<String>,
}

impl Classified {
    /// The `index`-th capture group (1-based, like the regex groups).
    pub fn capture(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.captures.get(i))
            .map(String::as_str)
    }
}

/// Classify a diagnostic. First matching row wins.
pub fn classify(message: &str) -> Option<Classified> {
    TABLE.iter().find_map(|(kind, pattern)| {
        let caps = pattern.captures(message)?;
        let captures = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().trim().to_string()).unwrap_or_default())
            .collect();
        Some(Classified {
            kind: *kind,
            captures,
        })
    })
}

/// The bullet named by a goal state's focus diagnostic, if any.
pub fn focus_next_bullet(diagnostic: &str) -> Option<String> {
    FOCUS_NEXT_BULLET
        .captures(diagnostic)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Whether a goal state's focus diagnostic asks to close a brace block.
pub fn focus_wants_unfocus(diagnostic: &str) -> bool {
    FOCUS_UNFOCUS_BRACE.is_match(diagnostic)
}
