//! Worker Pool Gate
//!
//! A counting permit pool bounding how many snapshot fetches run at once.
//! Poll cycles, post-subscribe refreshes and one-shot lookups all draw from
//! the same pool. Each permitted call is bounded by a timeout so a stuck
//! source cannot hold a permit indefinitely.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

/// Why a gated call did not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The call exceeded the fetch timeout.
    #[error("gated call timed out after {0:?}")]
    TimedOut(Duration),
    /// The pool was closed.
    #[error("worker pool closed")]
    Closed,
}

/// Shared concurrency ceiling for outbound fetches.
#[derive(Debug, Clone)]
pub struct WorkerPoolGate {
    permits: Arc<Semaphore>,
    width: usize,
    timeout: Duration,
}

impl WorkerPoolGate {
    /// Create a gate with `width` permits and a per-call timeout.
    #[must_use]
    pub fn new(width: usize, timeout: Duration) -> Self {
        let width = width.max(1);
        Self {
            permits: Arc::new(Semaphore::new(width)),
            width,
            timeout,
        }
    }

    /// Run `fut` once a permit is available.
    ///
    /// The permit is released when the call completes, fails or times out.
    /// Time spent waiting for the permit does not count against the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::TimedOut`] if `fut` overruns the timeout, or
    /// [`GateError::Closed`] if the pool was closed.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, GateError>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GateError::Closed)?;

        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| GateError::TimedOut(self.timeout))
    }

    /// Configured number of permits.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::task::JoinSet;

    use super::*;

    #[tokio::test]
    async fn zero_width_is_clamped() {
        let gate = WorkerPoolGate::new(0, Duration::from_secs(1));
        assert_eq!(gate.width(), 1);
        assert_eq!(gate.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_width() {
        let gate = WorkerPoolGate::new(3, Duration::from_secs(30));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = JoinSet::new();
        for _ in 0..12 {
            let gate = gate.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            tasks.spawn(async move {
                gate.run(async {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap(), Ok(()));
        }

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_releases_permit() {
        let gate = WorkerPoolGate::new(1, Duration::from_secs(2));

        let result = gate.run(std::future::pending::<()>()).await;

        assert_eq!(result, Err(GateError::TimedOut(Duration::from_secs(2))));
        assert_eq!(gate.available(), 1);
    }
}
