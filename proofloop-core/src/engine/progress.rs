//! Goal snapshot equality and the progress predicate.
//!
//! A step that the assistant accepts can still leave the goal exactly as it
//! was (an automation tactic that only reshuffles hypotheses, say). Such a
//! step is useless for the search, so oracle suggestions are checked with
//! [`progress`] before they are kept.

use std::collections::BTreeSet;

use crate::session::types::{Goal, GoalState, Hypothesis};

/// Collapse every whitespace run to a single space.
pub fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hypothesis_key(hyp: &Hypothesis) -> (BTreeSet<&str>, String) {
    (
        hyp.names.iter().map(String::as_str).collect(),
        normalize_spaces(&hyp.ty),
    )
}

/// Whether two goals are the same up to whitespace and hypothesis order.
///
/// Conclusions are compared after whitespace normalization; hypotheses are
/// compared as a multiset of (name set, normalized type) pairs.
pub fn same_goal(a: &Goal, b: &Goal) -> bool {
    if normalize_spaces(&a.conclusion) != normalize_spaces(&b.conclusion) {
        return false;
    }
    if a.hypotheses.len() != b.hypotheses.len() {
        return false;
    }
    let mut left: Vec<_> = a.hypotheses.iter().map(hypothesis_key).collect();
    let mut right: Vec<_> = b.hypotheses.iter().map(hypothesis_key).collect();
    left.sort();
    right.sort();
    left == right
}

/// Whether moving from `before` to `after` changed anything worth keeping.
///
/// A change in the number of focused goals counts as progress; otherwise the
/// first focused goal must differ.
pub fn progress(before: &GoalState, after: &GoalState) -> bool {
    if before.goals.len() != after.goals.len() {
        return true;
    }
    match (before.goals.first(), after.goals.first()) {
        (Some(old), Some(new)) => !same_goal(old, new),
        _ => false,
    }
}
