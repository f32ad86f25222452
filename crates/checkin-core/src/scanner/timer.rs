use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// A single cancellable scheduled transition.
///
/// Scheduling replaces any pending value. [`fired`](Self::fired) is
/// cancel-safe: dropping it inside `select!` leaves the schedule intact.
#[derive(Debug)]
pub struct DelayedTransition<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Default for DelayedTransition<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> DelayedTransition<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, after: Duration, value: T) {
        self.pending = Some((Instant::now() + after, value));
    }

    /// Drop the pending transition. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolves with the value once the deadline passes. Never resolves
    /// while nothing is scheduled.
    pub async fn fired(&mut self) -> T {
        let Some(deadline) = self.pending.as_ref().map(|(at, _)| *at) else {
            return std::future::pending().await;
        };
        sleep_until(deadline).await;
        match self.pending.take() {
            Some((_, value)) => value,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let mut timer = DelayedTransition::new();
        timer.schedule(Duration::from_secs(3), "resume");
        let started = Instant::now();
        assert_eq!(timer.fired().await, "resume");
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_transition_never_fires() {
        let mut timer = DelayedTransition::new();
        timer.schedule(Duration::from_secs(3), 1_u8);
        assert!(timer.cancel());
        assert!(!timer.cancel());

        let raced = tokio::time::timeout(Duration::from_secs(10), timer.fired()).await;
        assert!(raced.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_pending_value() {
        let mut timer = DelayedTransition::new();
        timer.schedule(Duration::from_secs(1), 1_u8);
        timer.schedule(Duration::from_secs(5), 2_u8);
        let started = Instant::now();
        assert_eq!(timer.fired().await, 2);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
