use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};

/// One-shot delayed action owned by the playback session.
///
/// Dropping or cancelling the timer guarantees it never fires.
#[derive(Debug, Default)]
pub struct RetryTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, replacing any pending deadline.
    pub fn schedule(&mut self, delay: Duration) {
        self.sleep = Some(Box::pin(sleep(delay)));
    }

    /// Returns whether a pending deadline was discarded.
    pub fn cancel(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    pub fn is_scheduled(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves when the armed deadline passes; pending forever when disarmed.
    ///
    /// Cancel-safe: dropping the future keeps the deadline armed.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(deadline) => {
                deadline.as_mut().await;
                self.sleep = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Instant};

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_the_delay() {
        let mut timer = RetryTimer::new();
        let start = Instant::now();
        timer.schedule(Duration::from_secs(2));

        timer.fired().await;

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(!timer.is_scheduled());
        assert!(timeout(Duration::from_secs(60), timer.fired()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let mut timer = RetryTimer::new();
        timer.schedule(Duration::from_secs(2));

        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert!(timeout(Duration::from_secs(60), timer.fired()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_moves_the_deadline() {
        let mut timer = RetryTimer::new();
        let start = Instant::now();
        timer.schedule(Duration::from_secs(1));
        timer.schedule(Duration::from_secs(5));

        timer.fired().await;

        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
