//! Exponential backoff retry policy shared by every hub call (§4.3).

use rand::Rng;
use std::time::Duration;

/// Status codes considered retriable per §4.3.
pub const RETRIABLE_STATUS: &[u16] = &[408, 500, 502, 503, 504];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: Duration::from_millis(500),
            cap: Duration::from_secs(30),
            jitter_fraction: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given 1-indexed attempt, e.g. `delay_for(1)` is the wait
    /// before the *second* try. `base * 2^(attempt-1)`, capped, with ±jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base.as_millis() as f64 * 2f64.powi(attempt as i32 - 1);
        let capped = exp.min(self.cap.as_millis() as f64);
        let jitter = 1.0 + rand::rng().random_range(-self.jitter_fraction..=self.jitter_fraction);
        Duration::from_millis((capped * jitter).max(0.0) as u64)
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping between attempts
/// according to `policy`, retrying only while `is_retriable` returns true.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_retriable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < policy.max_attempts && is_retriable(&e) => {
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_is_capped() {
        let policy = RetryPolicy {
            jitter_fraction: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        // Eventually caps at 30s regardless of attempt count.
        assert_eq!(policy.delay_for(20), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn retries_until_success_or_attempts_exhausted() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(2),
            jitter_fraction: 0.0,
        };
        let result: Result<u32, &str> = with_retry(
            &policy,
            |_: &&str| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("fail")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
