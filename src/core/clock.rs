use crate::core::error::{EngineError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of the current time, injected into every service.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used for replays and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    /// Move the clock by `by`. Fails, leaving the time unchanged, if the
    /// result is outside the representable range.
    pub fn advance(&self, by: Duration) -> Result<()> {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.checked_add_signed(by).ok_or_else(|| {
            EngineError::InvalidConfig(format!("advancing the clock by {} overflows", by))
        })?;
        Ok(())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::days(3)).unwrap();
        assert_eq!(clock.now(), start + Duration::days(3));
    }

    #[test]
    fn test_manual_clock_rejects_overflow() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert!(matches!(
            clock.advance(Duration::days(100_000_000)),
            Err(EngineError::InvalidConfig(_))
        ));
        assert_eq!(clock.now(), start);
    }
}
