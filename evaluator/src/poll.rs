//! Bounded fixed-interval status polling.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Source of time for [`PollPolicy::wait_for`].
#[async_trait]
pub trait Scheduler: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStop {
    Reached,
    TimedOut,
    Cancelled,
}

/// How a poll ended. A timeout is not an error: the caller inspects `last_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub last_status: String,
    pub stop: PollStop,
    pub attempts: usize,
    pub elapsed: Duration,
}

impl PollOutcome {
    pub fn converged(&self) -> bool {
        self.stop == PollStop::Reached
    }
}

impl PollPolicy {
    /// Calls `fetch` until it returns `wanted`, `max_wait` has elapsed, or `cancel` fires.
    ///
    /// The status is fetched once up front, then once after every `interval`.
    /// Errors from `fetch` are returned as they are.
    pub async fn wait_for<F, Fut, E>(
        &self,
        scheduler: &dyn Scheduler,
        cancel: &CancellationToken,
        wanted: &str,
        mut fetch: F,
    ) -> Result<PollOutcome, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let start = scheduler.now();
        let mut last_status = fetch().await?;
        let mut attempts = 1;
        let mut elapsed = Duration::ZERO;
        let stop = loop {
            if last_status == wanted {
                break PollStop::Reached;
            }
            if elapsed >= self.max_wait {
                break PollStop::TimedOut;
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => break PollStop::Cancelled,
                () = scheduler.sleep(self.interval) => {}
            }
            last_status = fetch().await?;
            attempts += 1;
            elapsed = scheduler.now().saturating_duration_since(start);
            info!(
                status = %last_status,
                elapsed_s = elapsed.as_secs(),
                "Waiting for status `{wanted}`"
            );
        };
        Ok(PollOutcome {
            last_status,
            stop,
            attempts,
            elapsed,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Advances virtual time on every sleep instead of waiting.
    pub(crate) struct ManualScheduler {
        now: Mutex<Instant>,
        pub(crate) sleeps: AtomicUsize,
    }

    impl ManualScheduler {
        pub(crate) fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
                sleeps: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Scheduler for ManualScheduler {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.fetch_add(1, Ordering::SeqCst);
            *self.now.lock().unwrap() += duration;
        }
    }

    fn statuses(values: &[&str]) -> Mutex<std::vec::IntoIter<String>> {
        Mutex::new(
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .into_iter(),
        )
    }

    #[tokio::test]
    async fn test_poll_stops_when_status_reached() {
        let scheduler = ManualScheduler::new();
        let responses = statuses(&["CREATED", "EXPORTING", "READY", "never fetched"]);
        let responses = &responses;
        let outcome = PollPolicy::default()
            .wait_for(&scheduler, &CancellationToken::new(), "READY", move || async move {
                Ok::<_, String>(responses.lock().unwrap().next().unwrap())
            })
            .await
            .unwrap();
        assert_eq!(outcome.stop, PollStop::Reached);
        assert!(outcome.converged());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.elapsed, Duration::from_secs(20));
        assert_eq!(scheduler.sleeps.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_poll_returns_last_status_on_timeout() {
        let scheduler = ManualScheduler::new();
        let policy = PollPolicy {
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(30),
        };
        let outcome = policy
            .wait_for(&scheduler, &CancellationToken::new(), "READY", || async {
                Ok::<_, String>("EXPORTING".to_string())
            })
            .await
            .unwrap();
        assert_eq!(outcome.stop, PollStop::TimedOut);
        assert_eq!(outcome.last_status, "EXPORTING");
        // One initial fetch plus one per interval until 30s have elapsed.
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.elapsed, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_poll_with_zero_max_wait_fetches_once() {
        let scheduler = ManualScheduler::new();
        let policy = PollPolicy {
            interval: Duration::from_secs(10),
            max_wait: Duration::ZERO,
        };
        let outcome = policy
            .wait_for(&scheduler, &CancellationToken::new(), "READY", || async {
                Ok::<_, String>("CREATED".to_string())
            })
            .await
            .unwrap();
        assert_eq!(outcome.stop, PollStop::TimedOut);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(scheduler.sleeps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_poll_honors_cancellation() {
        let scheduler = ManualScheduler::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = PollPolicy::default()
            .wait_for(&scheduler, &cancel, "READY", || async {
                Ok::<_, String>("EXPORTING".to_string())
            })
            .await
            .unwrap();
        assert_eq!(outcome.stop, PollStop::Cancelled);
        assert_eq!(outcome.last_status, "EXPORTING");
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_poll_propagates_fetch_errors() {
        let scheduler = ManualScheduler::new();
        let result = PollPolicy::default()
            .wait_for(&scheduler, &CancellationToken::new(), "READY", || async {
                Err::<String, _>("service unavailable".to_string())
            })
            .await;
        assert_eq!(result.unwrap_err(), "service unavailable");
    }
}
