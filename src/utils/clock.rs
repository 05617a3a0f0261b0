use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of wall-clock time and timers for the tracker. Everything that samples, rolls over or
/// debounces goes through it, so tests can run the host loop on paused tokio time with a fixed
/// calendar.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: tokio::time::Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: tokio::time::Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
