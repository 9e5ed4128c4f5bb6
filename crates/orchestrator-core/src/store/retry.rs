//! Busy-retry policy for the MetadataStore.
//!
//! Unlike a generic exponential-backoff-with-jitter policy, the busy-retry
//! delays here are a fixed doubling sequence: the spec pins the exact delays
//! as a testable property (10, 20, 40, 80, 160 ms; 5 retries after the
//! initial attempt, 6 attempts total).

use std::time::Duration;

/// Fixed backoff schedule used when the underlying store reports a
/// busy/locked error. Not jittered: the exact delay sequence is asserted by
/// tests, so randomness would make those tests flaky.
#[derive(Debug, Clone, PartialEq)]
pub struct BusyRetryPolicy {
    delays: Vec<Duration>,
}

impl Default for BusyRetryPolicy {
    fn default() -> Self {
        Self {
            delays: [10, 20, 40, 80, 160]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

impl BusyRetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Total attempts including the initial one, i.e. the initial try plus
    /// every retry `delay_for_attempt` has a delay for.
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Delay before the given retry attempt (1-indexed: the first retry
    /// after the initial failed attempt is attempt 1). Returns `None` once
    /// attempts are exhausted, meaning the caller should surface the error.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt - 1).copied()
    }
}

/// Runs `op` with the busy-retry policy, treating any `Err` whose
/// `is_busy()` returns false as immediately fatal (not retried).
pub async fn retry_on_busy<T, E, F, Fut>(policy: &BusyRetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: IsBusy,
{
    let mut attempt = 1usize;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_busy() => match policy.delay_for_attempt(attempt) {
                Some(delay) => {
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "store busy, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}

pub trait IsBusy {
    fn is_busy(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delays_match_spec() {
        let policy = BusyRetryPolicy::default();
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(20)));
        assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(40)));
        assert_eq!(policy.delay_for_attempt(4), Some(Duration::from_millis(80)));
        assert_eq!(policy.delay_for_attempt(5), Some(Duration::from_millis(160)));
        assert_eq!(policy.delay_for_attempt(6), None);
    }

    #[derive(Debug)]
    struct Busy;
    impl IsBusy for Busy {
        fn is_busy(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn retries_until_success_then_returns() {
        let policy = BusyRetryPolicy::default();
        let attempts = std::sync::atomic::AtomicUsize::new(0);
        let result: Result<&str, Busy> = retry_on_busy(&policy, || {
            let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Busy)
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_error_after_exhaustion() {
        let policy = BusyRetryPolicy::new(vec![Duration::from_millis(1)]);
        let result: Result<(), Busy> = retry_on_busy(&policy, || async { Err(Busy) }).await;
        assert!(result.is_err());
    }
}
