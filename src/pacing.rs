use crate::traits::Pacer;
use std::time::Duration;

/// Sleeps for a fixed duration between chapters.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl FixedDelay {
    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::from_millis(500)
    }
}

#[async_trait::async_trait]
impl Pacer for FixedDelay {
    async fn pause(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// No pause at all; for tests and local mirrors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait::async_trait]
impl Pacer for NoDelay {
    async fn pause(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_sleeps() {
        let start = tokio::time::Instant::now();
        FixedDelay::from_millis(300).pause().await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn no_delay_returns_immediately() {
        tokio_test::assert_ready!(tokio_test::task::spawn(NoDelay.pause()).poll());
    }
}
