//! Idle timeout for half-typed commands
//!
//! If the operator walks away in the middle of a command, the partial line
//! is first flagged and then thrown away so the console does not stay stuck
//! on stale input.

use std::time::Instant;

/// Minimum non-zero command timeout in milliseconds
pub const COMMAND_MIN_TIMEOUT: u64 = 3000;

/// Millisecond time source
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock based on [`Instant`], counting from construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// What the watchdog wants done after a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    /// Nothing to report
    None,
    /// Half the timeout has passed; warn once
    Warn,
    /// Half the timeout passed and the full one too, in a single check
    WarnAndDiscard,
    /// Full timeout passed; drop the partial line
    Discard,
}

impl IdleAction {
    pub fn warns(self) -> bool {
        matches!(self, IdleAction::Warn | IdleAction::WarnAndDiscard)
    }

    pub fn discards(self) -> bool {
        matches!(self, IdleAction::Discard | IdleAction::WarnAndDiscard)
    }
}

/// Tracks time since the last keystroke
#[derive(Debug, Clone, Default)]
pub struct IdleWatchdog {
    timeout_ms: u64,
    half_timeout_ms: u64,
    last_key_ms: u64,
    warned: bool,
}

impl IdleWatchdog {
    /// A disabled watchdog
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout. 0 disables it; anything else is raised to
    /// [`COMMAND_MIN_TIMEOUT`].
    pub fn set_timeout(&mut self, ms: u64) {
        let ms = if ms != 0 && ms < COMMAND_MIN_TIMEOUT {
            COMMAND_MIN_TIMEOUT
        } else {
            ms
        };
        self.timeout_ms = ms;
        self.half_timeout_ms = ms / 2;
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout_ms > 0
    }

    /// A byte was accepted: restart the clock and re-arm the warning
    pub fn keystroke(&mut self, now_ms: u64) {
        self.last_key_ms = now_ms;
        self.warned = false;
    }

    /// Check elapsed idle time. Only meaningful while a line is being typed.
    pub fn check(&mut self, now_ms: u64) -> IdleAction {
        if !self.is_enabled() {
            return IdleAction::None;
        }
        let elapsed = now_ms.saturating_sub(self.last_key_ms);
        if elapsed < self.half_timeout_ms {
            return IdleAction::None;
        }
        let warn = !self.warned;
        self.warned = true;
        match (warn, elapsed >= self.timeout_ms) {
            (true, true) => IdleAction::WarnAndDiscard,
            (false, true) => IdleAction::Discard,
            (true, false) => IdleAction::Warn,
            (false, false) => IdleAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_clamped_to_minimum() {
        let mut wd = IdleWatchdog::new();
        wd.set_timeout(500);
        assert_eq!(wd.timeout_ms(), COMMAND_MIN_TIMEOUT);

        wd.set_timeout(0);
        assert!(!wd.is_enabled());

        wd.set_timeout(10_000);
        assert_eq!(wd.timeout_ms(), 10_000);
    }

    #[test]
    fn test_disabled_never_fires() {
        let mut wd = IdleWatchdog::new();
        wd.keystroke(0);
        assert_eq!(wd.check(1_000_000), IdleAction::None);
    }

    #[test]
    fn test_warn_once_then_discard() {
        let mut wd = IdleWatchdog::new();
        wd.set_timeout(3000);
        wd.keystroke(100);

        assert_eq!(wd.check(1000), IdleAction::None);
        assert_eq!(wd.check(1600), IdleAction::Warn);
        assert_eq!(wd.check(2000), IdleAction::None);
        assert_eq!(wd.check(3100), IdleAction::Discard);
    }

    #[test]
    fn test_keystroke_rearms_warning() {
        let mut wd = IdleWatchdog::new();
        wd.set_timeout(4000);
        wd.keystroke(0);
        assert_eq!(wd.check(2000), IdleAction::Warn);

        wd.keystroke(2500);
        assert_eq!(wd.check(4000), IdleAction::None);
        assert_eq!(wd.check(4500), IdleAction::Warn);
    }

    #[test]
    fn test_long_silence_warns_and_discards_together() {
        let mut wd = IdleWatchdog::new();
        wd.set_timeout(3000);
        wd.keystroke(0);
        let action = wd.check(5000);
        assert!(action.warns());
        assert!(action.discards());
    }
}
