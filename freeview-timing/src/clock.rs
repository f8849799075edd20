use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Time source for the experiment. Trial timestamps are milliseconds since
/// the clock's origin; session timestamps are wall-clock.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
    fn wall_time(&self) -> DateTime<Utc>;
    async fn sleep(&self, d: Duration);

    fn elapsed(&self, since_ms: f64) -> Duration {
        Duration::from_secs_f64((self.now_ms() - since_ms).max(0.0) / 1000.0)
    }
}

/// Monotonic clock on the tokio timer, so paused-time tests advance it
#[derive(Debug, Clone)]
pub struct TokioClock {
    start: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
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
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await
    }
}
