//! Minimum-interval gate for hardware refreshes
//!
//! The host may call the keep-alive hook far more often than the serial
//! link can answer. The throttle decouples the two.

use std::time::{Duration, Instant};

/// True iff strictly more than `min_interval` has elapsed since `last`.
///
/// A `now` earlier than `last` never passes.
pub fn should_refresh(now: Instant, last: Instant, min_interval: Duration) -> bool {
    now.checked_duration_since(last)
        .is_some_and(|elapsed| elapsed > min_interval)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingThrottle {
    min_interval: Duration,
}

impl PollingThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    /// Negative or NaN input closes to zero, out-of-range input saturates
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::new(Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        }))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// With no previous successful refresh the gate is open
    pub fn should_refresh(&self, now: Instant, last_refresh_at: Option<Instant>) -> bool {
        match last_refresh_at {
            None => true,
            Some(last) => should_refresh(now, last, self.min_interval),
        }
    }
}
