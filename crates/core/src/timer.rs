//! Interview Turn Timer
//!
//! Tracks wall-clock time since the call opened and answers two questions at
//! the start of every response cycle: has the interview run out of time, and
//! is it time to warn the candidate that the end is near.

use std::time::Duration;
use tokio::time::Instant;

/// Spoken when the interview has reached its maximum duration.
pub const EXPIRED_MESSAGE: &str = "We've reached the end of our time together. \
Thank you so much for your answers today, you did a great job practicing. \
Best of luck with your interviews. Goodbye!";

/// What the timer says about the current response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCheck {
    /// Plenty of time left.
    Running,
    /// Remaining time just fell below the warning threshold.
    Warn,
    /// Elapsed time reached the configured maximum.
    Expired,
}

#[derive(Debug, Clone)]
pub struct TurnTimer {
    started_at: Instant,
    max_duration: Duration,
    warn_before: Duration,
    warned: bool,
}

impl TurnTimer {
    /// Starts the clock now.
    pub fn start(max_duration: Duration, warn_before: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            max_duration,
            warn_before,
            warned: false,
        }
    }

    pub fn from_minutes(max_minutes: u64, warn_minutes: u64) -> Self {
        Self::start(
            Duration::from_secs(max_minutes * 60),
            Duration::from_secs(warn_minutes * 60),
        )
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.max_duration.saturating_sub(self.elapsed())
    }

    pub fn has_exceeded_time(&self) -> bool {
        self.elapsed() >= self.max_duration
    }

    /// True once remaining time is under the threshold and no warning has
    /// been given yet for this crossing.
    pub fn should_warn(&self) -> bool {
        !self.warned && self.remaining() < self.warn_before
    }

    /// Spoken when the remaining time first drops below the warning threshold.
    pub fn warning_message(&self) -> String {
        let minutes = self.warn_before.as_secs().div_ceil(60);
        let left = match minutes {
            0 | 1 => "about a minute".to_string(),
            n => format!("about {n} minutes"),
        };
        format!(
            "Just a quick heads up, we have {left} left. \
Let's make the most of it. Please go ahead and finish your thought."
        )
    }

    /// Evaluates both predicates from a single reading of the clock.
    ///
    /// Expiry wins over the warning, and a returned `Warn` is consumed so the
    /// next check reports `Running` until expiry.
    pub fn check(&mut self) -> TimerCheck {
        let elapsed = self.elapsed();
        if elapsed >= self.max_duration {
            return TimerCheck::Expired;
        }
        let remaining = self.max_duration - elapsed;
        if !self.warned && remaining < self.warn_before {
            self.warned = true;
            return TimerCheck::Warn;
        }
        TimerCheck::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_running_before_threshold() {
        let mut timer = TurnTimer::from_minutes(15, 5);
        advance(Duration::from_secs(9 * 60)).await;
        assert!(!timer.should_warn());
        assert!(!timer.has_exceeded_time());
        assert_eq!(timer.check(), TimerCheck::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warns_once_after_threshold() {
        let mut timer = TurnTimer::from_minutes(15, 5);
        advance(Duration::from_secs(10 * 60 + 1)).await;
        assert!(timer.should_warn());
        assert_eq!(timer.check(), TimerCheck::Warn);
        assert!(!timer.should_warn());
        assert_eq!(timer.check(), TimerCheck::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_takes_precedence_over_warning() {
        let mut timer = TurnTimer::from_minutes(15, 5);
        advance(Duration::from_secs(15 * 60)).await;
        assert!(timer.has_exceeded_time());
        assert!(timer.should_warn());
        assert_eq!(timer.check(), TimerCheck::Expired);
        assert_eq!(timer.check(), TimerCheck::Expired);
    }

    #[test]
    fn test_warning_message_follows_configured_threshold() {
        assert!(
            TurnTimer::from_minutes(15, 3)
                .warning_message()
                .contains("about 3 minutes left")
        );
        assert!(
            TurnTimer::from_minutes(15, 5)
                .warning_message()
                .contains("about 5 minutes left")
        );
        assert!(
            TurnTimer::start(Duration::from_secs(600), Duration::from_secs(45))
                .warning_message()
                .contains("about a minute left")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_saturates() {
        let timer = TurnTimer::from_minutes(1, 0);
        advance(Duration::from_secs(120)).await;
        assert_eq!(timer.remaining(), Duration::ZERO);
    }
}
