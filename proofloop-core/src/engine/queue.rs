//! The pending-step queue.
//!
//! Owned by exactly one attempt and passed explicitly to every function that
//! reorders it, so each repair can be exercised on its own.

use std::collections::VecDeque;

use super::step::ProofStep;

/// Steps waiting to be executed, front first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingQueue {
    steps: VecDeque<ProofStep>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn pop_front(&mut self) -> Option<ProofStep> {
        self.steps.pop_front()
    }

    /// Put a step ahead of everything else.
    pub fn push_front(&mut self, step: ProofStep) {
        self.steps.push_front(step);
    }

    pub fn front(&self) -> Option<&ProofStep> {
        self.steps.front()
    }

    /// Drop every pending step.
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Drop steps from the front until one whose canonical text is `marker`.
    ///
    /// The matching step stays at the front. Returns how many were dropped.
    pub fn drop_until(&mut self, marker: &str) -> usize {
        let mut dropped = 0;
        while let Some(front) = self.steps.front() {
            if front.is(marker) {
                break;
            }
            self.steps.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Canonical texts of the pending steps, front first.
    pub fn texts(&self) -> Vec<&str> {
        self.steps.iter().map(ProofStep::short_text).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProofStep> {
        self.steps.iter()
    }
}

impl FromIterator<ProofStep> for PendingQueue {
    fn from_iter<I: IntoIterator<Item = ProofStep>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<ProofStep>> for PendingQueue {
    fn from(steps: Vec<ProofStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}
