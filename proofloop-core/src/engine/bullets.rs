//! Bullet markers and the bullet stack.
//!
//! Bullets (`-`, `+`, `*` and their repetitions) focus one sibling subgoal at
//! a time. The session only keeps a flat list of executed steps, so the open
//! bullets are recomputed from that list whenever they are needed.

use serde::{Deserialize, Serialize};

/// The three bullet characters, in succession order.
pub const BULLET_CHARS: [char; 3] = ['-', '+', '*'];

/// Whether `text` consists solely of one repeated bullet character.
pub fn is_bullet(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if BULLET_CHARS.contains(&first) => chars.all(|c| c == first),
        _ => false,
    }
}

/// Successor of a bullet: `-` → `+` → `*` → `--` → `++` → `**` → `---` ...
///
/// The empty marker yields `-`; anything that is not a bullet yields `None`.
pub fn next_bullet(bullet: &str) -> Option<String> {
    if bullet.is_empty() {
        return Some("-".to_string());
    }
    if !is_bullet(bullet) {
        return None;
    }
    let len = bullet.chars().count();
    let next = match bullet.chars().next() {
        Some('-') => "+".repeat(len),
        Some('+') => "*".repeat(len),
        _ => "-".repeat(len + 1),
    };
    Some(next)
}

/// Open bullet markers, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletStack(Vec<String>);

impl BulletStack {
    /// Rebuild the stack from executed steps.
    ///
    /// Seeing a marker that is already open closes every deeper level: the
    /// stack is truncated to end at that marker instead of growing.
    pub fn reconstruct<'a, I>(steps: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stack: Vec<String> = Vec::new();
        for step in steps {
            let text = step.trim();
            if !is_bullet(text) {
                continue;
            }
            match stack.iter().position(|b| b == text) {
                Some(index) => stack.truncate(index + 1),
                None => stack.push(text.to_string()),
            }
        }
        Self(stack)
    }

    /// The deepest open bullet.
    pub fn innermost(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The bullet one level above the innermost.
    pub fn parent(&self) -> Option<&str> {
        self.0.len().checked_sub(2).map(|i| self.0[i].as_str())
    }

    pub fn contains(&self, bullet: &str) -> bool {
        self.0.iter().any(|b| b == bullet)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// A bullet that can open a new level below the current ones.
    ///
    /// Starts from the successor of the innermost marker (or `-` when no
    /// bullet is open) and skips markers already in use.
    pub fn fresh(&self) -> String {
        let mut candidate = match self.innermost() {
            Some(b) => next_bullet(b).unwrap_or_else(|| "-".to_string()),
            None => "-".to_string(),
        };
        while self.contains(&candidate) {
            candidate = match next_bullet(&candidate) {
                Some(next) => next,
                None => break,
            };
        }
        candidate
    }
}
