//! Randomized request delay
//!
//! Every outbound request waits a uniformly random time first so the request
//! rate stays below the site's abuse detection.

use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl Throttle {
    /// Creates a throttle drawing delays from `[min_delay_ms, max_delay_ms]`
    ///
    /// Bounds given in the wrong order are swapped.
    pub fn new(min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            min_delay_ms: min_delay_ms.min(max_delay_ms),
            max_delay_ms: min_delay_ms.max(max_delay_ms),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.min_delay_ms, config.max_delay_ms)
    }

    /// A throttle that never waits
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Draws the next delay
    pub fn next_delay(&self) -> Duration {
        if self.min_delay_ms == self.max_delay_ms {
            return Duration::from_millis(self.min_delay_ms);
        }

        let ms = rand::rng().random_range(self.min_delay_ms..=self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Sleeps for a freshly drawn delay
    pub async fn wait(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::trace!("Throttling for {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}
