use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of "now" for everything that enforces an expiry.
///
/// Token issuance, state TTLs and credential staleness all read time through
/// this trait so tests can move the clock instead of sleeping.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualTimeProvider {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualTimeProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// Starts at the current wall-clock second.
    pub fn starting_now() -> Self {
        let now = Utc::now();
        Self::new(DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_all_clones() {
        let clock = ManualTimeProvider::starting_now();
        let other = clock.clone();
        let start = clock.now();

        other.advance(Duration::minutes(11));

        assert_eq!(clock.now() - start, Duration::minutes(11));
        assert_eq!(clock.unix_timestamp(), start.timestamp() + 660);
    }
}
