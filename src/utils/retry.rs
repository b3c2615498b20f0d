//! Retry policy
//!
//! Fixed-interval, unbounded retry used for binding the listener and for
//! connecting to a server.

use log::warn;
use std::future::Future;
use std::io;
use std::time::Duration;

/// Interval between attempts unless configured otherwise
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(4);

/// Retries an operation forever at a fixed interval, or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_INTERVAL)
    }
}

impl RetryPolicy {
    pub fn new(interval: Duration, enabled: bool) -> Self {
        Self { interval, enabled }
    }

    /// Retry indefinitely, waiting `interval` between attempts.
    pub fn fixed(interval: Duration) -> Self {
        Self::new(interval, true)
    }

    /// Fail on the first error.
    pub fn disabled() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL, false)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Runs `op` until it succeeds, sleeping on the tokio timer between
    /// retryable failures.
    pub async fn run<T, Op, Fut>(
        &self,
        what: &str,
        op: Op,
        retryable: fn(&io::Error) -> bool,
    ) -> io::Result<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        self.run_with_sleep(what, op, retryable, tokio::time::sleep)
            .await
    }

    /// Same as [`RetryPolicy::run`] with a caller-supplied sleep.
    ///
    /// A failure that is not `retryable`, or any failure while the policy is
    /// disabled, is returned as is.
    pub async fn run_with_sleep<T, Op, Fut, S, SFut>(
        &self,
        what: &str,
        mut op: Op,
        retryable: fn(&io::Error) -> bool,
        mut sleep: S,
    ) -> io::Result<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = io::Result<T>>,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if self.enabled && retryable(&e) => {
                    warn!(
                        "{} failed: {}. Waiting {} ms.",
                        what,
                        e,
                        self.interval.as_millis()
                    );
                    sleep(self.interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
