use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Exponential backoff for reconnection: attempt `k` (1-indexed) waits
/// `base_delay * 2^(k-1)`, and no more than `max_attempts` delays are handed out
/// between resets.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl Backoff {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base_delay,
        }
    }

    /// Delay for a given 1-indexed attempt number
    pub fn delay_for(base_delay: Duration, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        base_delay.saturating_mul(factor)
    }

    /// Count the next attempt and return its delay, or `None` once the
    /// attempt budget is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        self.attempts += 1;
        Some(Self::delay_for(self.base_delay, self.attempts))
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// One-shot timer that delivers `input` to an actor inbox after `delay`.
///
/// The timer only holds a weak sender, so it never keeps the actor alive.
/// Dropping the timer cancels it.
pub(crate) struct ScheduledTimer {
    generation: u64,
    task: JoinHandle<()>,
}

impl ScheduledTimer {
    pub(crate) fn spawn<T>(
        delay: Duration,
        generation: u64,
        inbox: mpsc::WeakUnboundedSender<T>,
        input: T,
    ) -> Self
    where
        T: Send + 'static,
    {
        let task = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(tx) = inbox.upgrade() {
                // A closed inbox means the actor is gone; nothing to wake.
                let _ = tx.send(input);
            }
        });

        Self { generation, task }
    }

    /// Generation of the attempt this timer was armed for
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for ScheduledTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_from_base() {
        let mut backoff = Backoff::new(Duration::from_millis(2000), 3);

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(4000)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(8000)));
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_reset_restarts_ladder() {
        let mut backoff = Backoff::new(Duration::from_millis(500), 4);
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(!backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_zero_attempts_is_immediately_exhausted() {
        let mut backoff = Backoff::new(Duration::from_secs(1), 0);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn test_delay_saturates_instead_of_overflowing() {
        let delay = Backoff::delay_for(Duration::from_secs(1), 200);
        assert_eq!(delay, Duration::from_secs(1).saturating_mul(u32::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_timer_delivers_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = tokio::time::Instant::now();
        let _timer = ScheduledTimer::spawn(Duration::from_millis(300), 1, tx.downgrade(), 42u8);

        assert_eq!(rx.recv().await, Some(42));
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = ScheduledTimer::spawn(Duration::from_millis(300), 1, tx.downgrade(), 42u8);
        assert_eq!(timer.generation(), 1);
        drop(timer);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
