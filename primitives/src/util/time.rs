use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// One week, the grace period after which payloads and content campaigns expire.
pub fn week() -> Duration {
    Duration::days(7)
}

/// The time source for every expiry decision.
///
/// Handlers never call [`Utc::now()`] directly so that tests can freeze time.
pub trait Clock: fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Unix seconds with the microsecond fraction of the current second,
    /// e.g. `1_600_000_000.123456`.
    fn now_fractional(&self) -> f64 {
        let now = self.now();

        now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
