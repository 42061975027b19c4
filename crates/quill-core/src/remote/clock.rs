//! Time source for the remote client
//!
//! The client never reads the global clock directly, so spacing and
//! backoff can be observed exactly under a manual clock.

use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Monotonic time plus the ability to wait
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by tokio timers
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
