use parking_lot::Mutex;
use std::time::{Duration, SystemTime};

/// Wall-clock source for expiry decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// The real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to; lets tests age files and sessions instantly.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn starting_now() -> Self {
        Self::new(SystemTime::now())
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: SystemTime) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

/// True when `since` lies more than `ttl` in the past of `now`.
///
/// Timestamps from the future (clock skew, touched files) never count as expired.
pub fn is_expired(now: SystemTime, since: SystemTime, ttl: Duration) -> bool {
    now.duration_since(since)
        .map(|age| age > ttl)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = ManualClock::new(start);
        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now(), start + Duration::from_secs(60));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_expiry_boundaries() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(10_000);
        let ttl = Duration::from_secs(100);
        assert!(!is_expired(t0 + ttl, t0, ttl));
        assert!(is_expired(t0 + ttl + Duration::from_secs(1), t0, ttl));
        assert!(!is_expired(t0, t0 + Duration::from_secs(5), ttl));
    }
}
