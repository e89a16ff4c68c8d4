//! Per-question countdown.
//!
//! `Countdown` is a pure state machine (Idle → Running → Expired | Cancelled).
//! The runtime's ticker task only delivers `TimerTicked(token)` events once a
//! second; every decision about whether a tick still counts is made here,
//! against the token of the running countdown.

use std::fmt;
use tracing::{debug, trace};

/// Fallback duration when the service gives no usable time limit.
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 30;

/// Identifies one started countdown. Tokens are never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub generation: u64,
    pub question: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running { token: TimerToken, remaining: u32 },
    Expired { token: TimerToken },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Token does not belong to the running countdown.
    Ignored,
    Remaining(u32),
    /// Remaining time just reached zero. The expiry event is still to come.
    Elapsed,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    state: TimerState,
    generation: u64,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    pub fn new() -> Self {
        Self { state: TimerState::Idle, generation: 0 }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    /// Token of the running countdown, if any.
    pub fn active_token(&self) -> Option<TimerToken> {
        match self.state {
            TimerState::Running { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Start counting down from `seconds` for `question`, cancelling any
    /// countdown that is still running.
    pub fn start(&mut self, question: usize, seconds: u32) -> TimerToken {
        self.cancel();
        self.generation += 1;
        let token = TimerToken { generation: self.generation, question };
        self.state = TimerState::Running { token, remaining: seconds.max(1) };
        debug!(question, seconds, generation = self.generation, "Countdown started");
        token
    }

    /// Returns true if a running countdown was stopped.
    pub fn cancel(&mut self) -> bool {
        if let TimerState::Running { token, remaining } = self.state {
            debug!(question = token.question, remaining, "Countdown cancelled");
            self.state = TimerState::Cancelled;
            true
        } else {
            false
        }
    }

    pub fn tick(&mut self, token: TimerToken) -> Tick {
        match &mut self.state {
            TimerState::Running { token: current, remaining } if *current == token => {
                if *remaining == 0 {
                    // already elapsed, waiting for the expiry event
                    return Tick::Ignored;
                }
                *remaining -= 1;
                trace!(question = token.question, remaining = *remaining, "Countdown tick");
                if *remaining == 0 {
                    Tick::Elapsed
                } else {
                    Tick::Remaining(*remaining)
                }
            }
            _ => Tick::Ignored,
        }
    }

    /// Running(0) → Expired. False unless `token` is the running countdown and
    /// it has elapsed.
    pub fn expire(&mut self, token: TimerToken) -> bool {
        match self.state {
            TimerState::Running { token: current, remaining: 0 } if current == token => {
                self.state = TimerState::Expired { token };
                debug!(question = token.question, "Countdown expired");
                true
            }
            _ => false,
        }
    }

    /// Value for the timer display.
    pub fn display(&self) -> TimerDisplay {
        match self.state {
            TimerState::Running { remaining, .. } => TimerDisplay::Remaining(remaining),
            TimerState::Expired { .. } => TimerDisplay::TimeUp,
            TimerState::Idle | TimerState::Cancelled => TimerDisplay::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDisplay {
    Off,
    Remaining(u32),
    TimeUp,
}

impl fmt::Display for TimerDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerDisplay::Off => Ok(()),
            TimerDisplay::Remaining(secs) => write!(f, "Time left: {}", format_clock(*secs)),
            TimerDisplay::TimeUp => write!(f, "Time up!"),
        }
    }
}

/// `MM:SS`, zero padded.
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Turn the service's `time_limit` into a usable duration.
pub fn service_time_limit(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.ceil().min(u32::MAX as f64) as u32,
        _ => DEFAULT_TIME_LIMIT_SECS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_runs_to_expiry() {
        let mut countdown = Countdown::new();
        let token = countdown.start(0, 3);
        assert_eq!(countdown.display(), TimerDisplay::Remaining(3));
        assert_eq!(countdown.tick(token), Tick::Remaining(2));
        assert_eq!(countdown.tick(token), Tick::Remaining(1));
        assert_eq!(countdown.tick(token), Tick::Elapsed);
        assert_eq!(countdown.display().to_string(), "Time left: 00:00");

        // no further decrement while the expiry event is pending
        assert_eq!(countdown.tick(token), Tick::Ignored);
        assert!(countdown.expire(token));
        assert_eq!(countdown.display(), TimerDisplay::TimeUp);
        assert!(!countdown.expire(token));
    }

    #[test]
    fn test_restart_invalidates_previous_token() {
        let mut countdown = Countdown::new();
        let first = countdown.start(0, 5);
        countdown.cancel();
        let second = countdown.start(0, 5);
        assert_ne!(first, second);

        assert_eq!(countdown.tick(first), Tick::Ignored);
        assert_eq!(countdown.tick(second), Tick::Remaining(4));
        assert_eq!(countdown.tick(first), Tick::Ignored);
        assert_eq!(countdown.display(), TimerDisplay::Remaining(4));
    }

    #[test]
    fn test_cancel_stops_ticks_and_expiry() {
        let mut countdown = Countdown::new();
        let token = countdown.start(2, 1);
        assert_eq!(countdown.tick(token), Tick::Elapsed);
        assert!(countdown.cancel());
        assert!(!countdown.expire(token));
        assert_eq!(countdown.state(), TimerState::Cancelled);
        assert!(!countdown.cancel());
    }

    #[test]
    fn test_clock_format() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(45), "00:45");
        assert_eq!(format_clock(125), "02:05");
    }

    #[test]
    fn test_service_time_limit_fallback() {
        assert_eq!(service_time_limit(Some(20.0)), 20);
        assert_eq!(service_time_limit(Some(12.5)), 13);
        assert_eq!(service_time_limit(Some(0.0)), DEFAULT_TIME_LIMIT_SECS);
        assert_eq!(service_time_limit(Some(-4.0)), DEFAULT_TIME_LIMIT_SECS);
        assert_eq!(service_time_limit(None), DEFAULT_TIME_LIMIT_SECS);
    }
}
