use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of time for everything that paces or measures.
///
/// [Clock::now] is monotonic and only meaningful relative to other readings from the same clock.
/// [Clock::utc_now] is the wall clock used to timestamp records.
#[async_trait]
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> Duration;

    fn utc_now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by Tokio's timer.
#[derive(Debug, Clone)]
pub struct TokioClock {
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A clock that only moves when told to.
///
/// Sleeping advances the clock by the requested duration and returns immediately, so code that
/// polls for 90 seconds finishes instantly while still observing 90 seconds of elapsed time.
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: DateTime<Utc>,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.now()).unwrap_or(chrono::Duration::zero());
        self.origin + elapsed
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_clock_advances_on_sleep() {
        let clock = ManualClock::default();
        let start = clock.utc_now();

        clock.sleep(Duration::from_millis(250)).await;
        clock.advance(Duration::from_millis(750));

        assert_eq!(Duration::from_secs(1), clock.now());
        assert_eq!(chrono::Duration::seconds(1), clock.utc_now() - start);
    }

    #[tokio::test]
    async fn manual_clock_clones_share_time() {
        let clock = ManualClock::default();
        let other = clock.clone();

        other.sleep(Duration::from_secs(3)).await;

        assert_eq!(Duration::from_secs(3), clock.now());
    }

    #[tokio::test]
    async fn tokio_clock_is_monotonic() {
        let clock = TokioClock::new();
        let first = clock.now();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.now() >= first + Duration::from_millis(5));
    }
}
