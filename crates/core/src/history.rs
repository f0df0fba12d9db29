//! Conversation History Buffer
//!
//! An ordered log of the turns spoken during one call. The first entry is the
//! system instruction once it has been set, and the buffer can be pruned back
//! to a fixed cap without ever losing that instruction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest cap that still leaves room for the system turn plus one reply.
pub const MIN_HISTORY_CAP: usize = 2;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single spoken (or instructed) contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Bounded, ordered turn log owned by a single session.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    turns: Vec<Turn>,
    cap: usize,
}

impl HistoryBuffer {
    /// Creates an empty buffer. Caps below [`MIN_HISTORY_CAP`] are raised to it.
    pub fn new(cap: usize) -> Self {
        Self {
            turns: Vec::new(),
            cap: cap.max(MIN_HISTORY_CAP),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn has_system(&self) -> bool {
        matches!(self.turns.first(), Some(t) if t.role == Role::System)
    }

    /// Installs the system instruction at the head of the buffer.
    ///
    /// Only the first call has any effect; returns `false` when a system turn
    /// was already present.
    pub fn set_system(&mut self, text: impl Into<String>) -> bool {
        if self.has_system() {
            return false;
        }
        self.turns.insert(0, Turn::new(Role::System, text));
        true
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Role::Assistant, text));
    }

    /// Drops the oldest non-system turns until the buffer fits its cap.
    ///
    /// Returns how many turns were removed.
    pub fn prune(&mut self) -> usize {
        if self.turns.len() <= self.cap {
            return 0;
        }
        let excess = self.turns.len() - self.cap;
        let keep_from = if self.has_system() { 1 } else { 0 };
        self.turns.drain(keep_from..keep_from + excess);
        excess
    }

    /// A copy of the turns suitable for handing to a background task.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }
}
