use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use common::Notifier;

/// Bounded exponential backoff for notification delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait after the zero-based `attempt` failed: base, 2×base, 4×base, …
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(20))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Duration::from_secs(1))
    }
}

/// Delivers messages through a `Notifier`, retrying failed attempts.
///
/// `deliver` always resolves to a bool so the caller can persist the outcome;
/// errors never escape.
#[derive(Clone)]
pub struct NotificationSink {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl NotificationSink {
    pub fn new(notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn deliver(&self, message: &str) -> bool {
        for attempt in 0..self.policy.max_attempts {
            match self.notifier.send(message).await {
                Ok(()) => {
                    info!(attempt = attempt + 1, "Notification delivered");
                    return true;
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Notification attempt failed");
                }
            }

            if attempt + 1 < self.policy.max_attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        error!(
            attempts = self.policy.max_attempts,
            "Notification not delivered, giving up"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{Error, Result};
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    /// Fails the first `failures` attempts, then succeeds. Records when each attempt happened.
    struct FlakyNotifier {
        failures: usize,
        attempts: Mutex<Vec<Instant>>,
    }

    impl FlakyNotifier {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                attempts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, _message: &str) -> Result<()> {
            let mut attempts = self.attempts.lock().await;
            attempts.push(Instant::now());
            if attempts.len() <= self.failures {
                Err(Error::Notification("HTTP 502".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn delays_double_from_base() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5).map(|a| policy.delay_after(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fifth_attempt() {
        let notifier = FlakyNotifier::new(4);
        let sink = NotificationSink::new(notifier.clone(), RetryPolicy::default());

        assert!(sink.deliver("hello").await);

        let attempts = notifier.attempts.lock().await;
        assert_eq!(attempts.len(), 5);
        let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps.windows(2).all(|g| g[1] >= g[0]), "gaps must not shrink: {gaps:?}");
        assert_eq!(gaps[0], Duration::from_secs(1));
        assert_eq!(gaps[3], Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let notifier = FlakyNotifier::new(usize::MAX);
        let sink = NotificationSink::new(notifier.clone(), RetryPolicy::default());

        let started = Instant::now();
        assert!(!sink.deliver("hello").await);

        assert_eq!(notifier.attempts.lock().await.len(), 5);
        // 1 + 2 + 4 + 8; no wait after the final attempt
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_sends_once() {
        let notifier = FlakyNotifier::new(0);
        let sink = NotificationSink::new(notifier.clone(), RetryPolicy::default());

        assert!(sink.deliver("hello").await);
        assert_eq!(notifier.attempts.lock().await.len(), 1);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).max_attempts, 1);
    }
}
