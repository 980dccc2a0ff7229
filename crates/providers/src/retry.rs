//! Retry with per-attempt timeout and exponential backoff.
//!
//! Wraps any Provider. Each attempt is bounded by a timeout; transient
//! failures (rate limits, 5xx, timeouts, connection errors) are retried a
//! bounded number of times. Authentication and 4xx errors are returned
//! immediately.

use async_trait::async_trait;
use thriftbot_config::ProviderConfig;
use thriftbot_core::error::ProviderError;
use thriftbot_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.2;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
    /// Upper bound on a single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1_000),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&ProviderConfig> for RetryConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_backoff(),
            attempt_timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// A provider wrapper that adds a timeout and retry with backoff.
pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    config: RetryConfig,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn Provider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Delay before retry number `attempt` (0-indexed).
    fn delay_for_attempt(&self, attempt: u32, error: &ProviderError) -> Duration {
        // Server-provided hint wins
        if let ProviderError::RateLimited { retry_after_secs } = error {
            if *retry_after_secs > 0 {
                return Duration::from_secs(*retry_after_secs).min(self.config.max_delay);
            }
        }

        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);
        let jitter = deterministic_jitter(attempt, self.config.jitter_fraction);

        Duration::from_millis((capped_ms * jitter) as u64)
    }
}

/// Multiplier in [1 - fraction, 1 + fraction], stable per attempt.
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = attempt.wrapping_mul(2_654_435_761) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            let outcome =
                tokio::time::timeout(self.config.attempt_timeout, self.inner.complete(request.clone()))
                    .await;

            let error = match outcome {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(format!(
                    "{} did not respond within {}s",
                    self.inner.name(),
                    self.config.attempt_timeout.as_secs()
                )),
            };

            if !error.is_transient() || attempt >= self.config.max_retries {
                return Err(error);
            }

            let delay = self.delay_for_attempt(attempt, &error);
            warn!(
                provider = self.inner.name(),
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying provider call"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thriftbot_core::message::Message;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays a script of results, then succeeds forever.
    struct ScriptedProvider {
        script: Mutex<Vec<ProviderError>>,
        calls: AtomicU32,
        stall: Option<Duration>,
    }

    impl ScriptedProvider {
        fn failing_with(errors: Vec<ProviderError>) -> Self {
            Self {
                script: Mutex::new(errors),
                calls: AtomicU32::new(0),
                stall: None,
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() { None } else { Some(script.remove(0)) }
            };
            match next {
                Some(e) => Err(e),
                None => Ok(ProviderResponse {
                    message: Message::assistant("ok"),
                    usage: Some(Usage::new(3, 2)),
                    model: "mock".into(),
                }),
            }
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            attempt_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest::new("m", vec![Message::user("hi")])
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let inner = Arc::new(ScriptedProvider::failing_with(vec![
            ProviderError::Network("reset".into()),
            ProviderError::ApiError { status_code: 503, message: "busy".into() },
        ]));
        let provider = RetryProvider::new(inner.clone(), fast_config(3));

        let resp = provider.complete(request()).await.unwrap();
        assert_eq!(resp.message.content, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_auth_errors() {
        let inner = Arc::new(ScriptedProvider::failing_with(vec![
            ProviderError::AuthenticationFailed("bad key".into()),
        ]));
        let provider = RetryProvider::new(inner.clone(), fast_config(3));

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let inner = Arc::new(ScriptedProvider::failing_with(vec![
            ProviderError::Network("1".into()),
            ProviderError::Network("2".into()),
            ProviderError::Network("3".into()),
        ]));
        let provider = RetryProvider::new(inner.clone(), fast_config(1));

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_attempt_times_out() {
        let inner = Arc::new(ScriptedProvider {
            script: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            stall: Some(Duration::from_secs(5)),
        });
        let provider = RetryProvider::new(inner.clone(), fast_config(0));

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let provider = RetryProvider::new(
            Arc::new(ScriptedProvider::failing_with(Vec::new())),
            RetryConfig {
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_millis(1_000),
                jitter_fraction: 0.0,
                ..Default::default()
            },
        );
        let net = ProviderError::Network("x".into());
        assert_eq!(provider.delay_for_attempt(0, &net), Duration::from_millis(100));
        assert_eq!(provider.delay_for_attempt(1, &net), Duration::from_millis(200));
        assert_eq!(provider.delay_for_attempt(10, &net), Duration::from_millis(1_000));

        let limited = ProviderError::RateLimited { retry_after_secs: 1 };
        assert_eq!(provider.delay_for_attempt(0, &limited), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_stays_in_range() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!((0.8..=1.2).contains(&j));
        }
    }
}
