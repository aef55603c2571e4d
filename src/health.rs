//! Bounded health polling against an optional readiness endpoint.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{BerthError, Result};
use crate::ops::Probe;

type CancelHook = Arc<dyn Fn() + Send + Sync>;

/// Poll scheduler for one [`HealthReporter::await_ready`] call.
///
/// `cancel` is idempotent and runs exactly once per timer on every exit
/// path: explicitly when the poll loop settles, with `Drop` as the backstop.
struct PollTimer {
    interval: Duration,
    cancelled: bool,
    on_cancel: Option<CancelHook>,
}

impl PollTimer {
    fn new(interval: Duration, on_cancel: Option<CancelHook>) -> Self {
        Self {
            interval,
            cancelled: false,
            on_cancel,
        }
    }

    async fn tick(&self) {
        tokio::time::sleep(self.interval).await;
    }

    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        if let Some(hook) = self.on_cancel.take() {
            hook();
        }
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Resolves a definitive ready/not-ready verdict for the container's
/// service within a bounded wait.
pub struct HealthReporter {
    url: Option<String>,
    poll_interval: Duration,
    max_wait: Duration,
    probe: Arc<dyn Probe>,
    on_timer_cancel: Option<CancelHook>,
}

impl HealthReporter {
    pub fn new(
        url: Option<String>,
        poll_interval: Duration,
        max_wait: Duration,
        probe: Arc<dyn Probe>,
    ) -> Self {
        Self {
            url,
            poll_interval,
            max_wait,
            probe,
            on_timer_cancel: None,
        }
    }

    /// Observe release of the poll timer; fired exactly once per
    /// [`await_ready`](Self::await_ready) call that starts polling. Test
    /// instrumentation.
    pub fn on_timer_cancel(mut self, hook: CancelHook) -> Self {
        self.on_timer_cancel = Some(hook);
        self
    }

    /// Poll the configured endpoint until it is reachable or the bound
    /// elapses.
    ///
    /// With no endpoint configured this resolves immediately and the probe
    /// is never invoked. Exhaustion without a single successful probe fails
    /// with [`BerthError::HealthCheckTimeout`].
    pub async fn await_ready(&self) -> Result<()> {
        let Some(url) = &self.url else {
            tracing::debug!("no health check configured, skipping");
            return Ok(());
        };

        let mut timer = PollTimer::new(self.poll_interval, self.on_timer_cancel.clone());
        let started = Instant::now();

        loop {
            match self.probe.ping(url).await {
                Ok(()) => {
                    timer.cancel();
                    tracing::debug!(
                        "health check at {url} succeeded after {:?}",
                        started.elapsed()
                    );
                    return Ok(());
                }
                Err(e) => tracing::trace!("health check at {url} not ready: {e}"),
            }

            if started.elapsed() >= self.max_wait {
                timer.cancel();
                return Err(BerthError::HealthCheckTimeout {
                    url: url.clone(),
                    waited: started.elapsed(),
                });
            }

            timer.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::testing::StubProbe;

    fn cancel_counter() -> (CancelHook, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let hook = {
            let count = count.clone();
            Arc::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }) as CancelHook
        };
        (hook, count)
    }

    #[tokio::test]
    async fn test_no_url_resolves_without_probing() {
        let probe = Arc::new(StubProbe::never());
        let reporter = HealthReporter::new(
            None,
            Duration::from_millis(10),
            Duration::from_secs(1),
            probe.clone(),
        );

        reporter.await_ready().await.unwrap();

        assert_eq!(probe.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventual_success_resolves_ok() {
        let probe = Arc::new(StubProbe::succeed_after(3));
        let (hook, cancels) = cancel_counter();
        let reporter = HealthReporter::new(
            Some("http://localhost:4444/status".to_string()),
            Duration::from_millis(500),
            Duration::from_secs(15),
            probe.clone(),
        )
        .on_timer_cancel(hook);

        reporter.await_ready().await.unwrap();

        assert_eq!(probe.attempts(), 3);
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_fails_after_bound() {
        let probe = Arc::new(StubProbe::never());
        let (hook, cancels) = cancel_counter();
        let reporter = HealthReporter::new(
            Some("http://localhost:4444/status".to_string()),
            Duration::from_millis(500),
            Duration::from_secs(15),
            probe.clone(),
        )
        .on_timer_cancel(hook);

        let started = Instant::now();
        let err = reporter.await_ready().await.unwrap_err();

        assert!(started.elapsed() >= Duration::from_secs(15));
        assert!(
            matches!(err, BerthError::HealthCheckTimeout { waited, .. } if waited >= Duration::from_secs(15))
        );
        assert!(probe.attempts() > 1);
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_cancelled_once_on_immediate_success() {
        let probe = Arc::new(StubProbe::succeed_after(1));
        let (hook, cancels) = cancel_counter();
        let reporter = HealthReporter::new(
            Some("http://localhost:4444/status".to_string()),
            Duration::from_millis(500),
            Duration::from_secs(15),
            probe,
        )
        .on_timer_cancel(hook);

        reporter.await_ready().await.unwrap();

        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }
}
