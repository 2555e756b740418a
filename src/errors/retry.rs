use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::classification::ErrorClassification;
use super::types::AltscoutError;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

impl ErrorClassification {
    /// Pause before retry number `attempt` (0 for the first retry).
    ///
    /// Timeouts back off linearly from 5s; everything else doubles from 1s
    /// with up to a second of jitter. Both are capped at 30s.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let delay = if self.error_type == "TimeoutError" {
            Duration::from_secs(5 * (u64::from(attempt) + 1))
        } else {
            let base = 2f64.powi(attempt.min(16) as i32);
            Duration::from_secs_f64(base + rand::random::<f64>())
        };
        delay.min(MAX_BACKOFF)
    }
}

/// Bounded retries for collaborator calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Multiplier on every backoff delay; zero disables waiting.
    pub delay_scale: f64,
    /// Cuts a backoff pause short; the call then fails with `Cancelled`.
    pub cancel: CancellationToken,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, delay_scale: 1.0, cancel: CancellationToken::new() }
    }
}

impl RetryConfig {
    pub fn no_delay(max_retries: u32) -> Self {
        Self { max_retries, delay_scale: 0.0, cancel: CancellationToken::new() }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn scaled(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.delay_scale.max(0.0))
    }
}

/// Call `factory` until it succeeds, fails with a non-retryable error, or
/// `config.max_retries` retries are spent. The last error is returned as is.
pub async fn with_retry<F, Fut, T>(name: &str, config: &RetryConfig, mut factory: F) -> Result<T, AltscoutError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AltscoutError>>,
{
    let mut retries = 0u32;
    loop {
        let err = match factory().await {
            Ok(value) => {
                if retries > 0 {
                    debug!(operation = name, retries, "Recovered after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let class = err.classify();
        if !class.retryable {
            return Err(err);
        }
        if retries >= config.max_retries {
            warn!(operation = name, attempts = retries + 1, error = %err, "Giving up");
            return Err(err);
        }

        let delay = config.scaled(class.retry_delay(retries));
        warn!(
            operation = name,
            retry = retries + 1,
            of = config.max_retries,
            error_type = class.error_type,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient failure, retrying"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = config.cancel.cancelled() => {
                debug!(operation = name, "Backoff interrupted by cancellation");
                return Err(AltscoutError::Cancelled);
            }
        }
        retries += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn class(error_type: &'static str) -> ErrorClassification {
        ErrorClassification { error_type, retryable: true }
    }

    #[test]
    fn test_timeout_backoff_is_linear_and_capped() {
        let timeout = class("TimeoutError");
        assert_eq!(timeout.retry_delay(0), Duration::from_secs(5));
        assert_eq!(timeout.retry_delay(2), Duration::from_secs(15));
        assert_eq!(timeout.retry_delay(20), MAX_BACKOFF);
    }

    #[test]
    fn test_default_backoff_doubles_with_jitter() {
        let network = class("NetworkError");
        let first = network.retry_delay(0).as_secs_f64();
        let third = network.retry_delay(2).as_secs_f64();
        assert!((1.0..2.0).contains(&first));
        assert!((4.0..5.0).contains(&third));
        assert_eq!(network.retry_delay(40), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = &AtomicU32::new(0);
        let result = with_retry("scan page", &RetryConfig::no_delay(3), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AltscoutError::Network("connection reset".into()))
            } else {
                Ok("page 100")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "page 100");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result = with_retry("department VIPs", &RetryConfig::no_delay(3), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(AltscoutError::Authentication("rejected".into()))
        })
        .await;
        assert!(matches!(result, Err(AltscoutError::Authentication(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = &AtomicU32::new(0);
        let result = with_retry("list pages", &RetryConfig::no_delay(2), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(AltscoutError::Collaborator("acli crashed".into()))
        })
        .await;
        assert!(matches!(result, Err(AltscoutError::Collaborator(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_backoff() {
        let calls = &AtomicU32::new(0);
        let token = CancellationToken::new();
        token.cancel();
        let config = RetryConfig::default().with_cancel(token);

        let started = std::time::Instant::now();
        let result = with_retry("resolve email", &config, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(AltscoutError::Network("connection reset".into()))
        })
        .await;

        assert!(matches!(result, Err(AltscoutError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
