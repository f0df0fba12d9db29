//! End-of-call classification.
//!
//! When a connection closes, downstream collectors want to know whether the
//! interview ran its course, was ended deliberately, or was cut short.

use std::fmt;
use std::time::Duration;

/// Thresholds below which a call counts as interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomePolicy {
    pub min_duration: Duration,
    pub min_exchanges: u32,
}

impl Default for OutcomePolicy {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_secs(60),
            min_exchanges: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call closed normally after a meaningful exchange.
    Completed,
    /// The session itself ended the call, with the given reason code.
    Ended(String),
    /// The call was too short to be a real interview.
    Interrupted,
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOutcome::Completed => write!(f, "completed"),
            CallOutcome::Ended(reason) => write!(f, "ended:{reason}"),
            CallOutcome::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl OutcomePolicy {
    pub fn classify(&self, elapsed: Duration, exchanges: u32, end_reason: Option<&str>) -> CallOutcome {
        if let Some(reason) = end_reason {
            return CallOutcome::Ended(reason.to_string());
        }
        if elapsed < self.min_duration || exchanges < self.min_exchanges {
            CallOutcome::Interrupted
        } else {
            CallOutcome::Completed
        }
    }
}
