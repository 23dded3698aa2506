//! Retry policy for model calls: exponential backoff with a per-attempt deadline.

use chrono::Utc;
use keepsake_config::RetryConfig;
use keepsake_core::error::ProviderError;
use keepsake_core::event::{DomainEvent, EventBus};
use keepsake_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::time::Duration;
use tracing::warn;

/// Longest server `retry-after` a turn will wait out.
const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
    /// A rate-limit hint above this ends the retries instead of waiting
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            request_timeout: config.request_timeout(),
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        }
    }

    /// Delay before retry number `attempt` (1-based: the wait after the first failure is `backoff(1)`).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Call the provider until it answers, a permanent error occurs, or
    /// attempts run out. The last error is returned on exhaustion.
    pub async fn complete(
        &self,
        provider: &dyn Provider,
        request: &ProviderRequest,
        events: &EventBus,
    ) -> Result<ProviderResponse, ProviderError> {
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.request_timeout, provider.complete(request.clone())).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "no response from '{}' within {}s",
                    provider.name(),
                    self.request_timeout.as_secs()
                ))),
            };

            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.max_attempts {
                return Err(error);
            }

            let mut delay = self.backoff(attempt);
            if let ProviderError::RateLimited { retry_after_secs } = &error {
                let hint = Duration::from_secs(*retry_after_secs);
                if hint > self.max_retry_after {
                    warn!(
                        provider = provider.name(),
                        attempt,
                        retry_after_secs = *retry_after_secs,
                        "Rate limit outlasts the retry budget, giving up"
                    );
                    return Err(error);
                }
                delay = delay.max(hint);
            }

            warn!(
                provider = provider.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Model call failed, retrying"
            );
            events.publish(DomainEvent::ModelRetry {
                attempt,
                error_message: error.to_string(),
                timestamp: Utc::now(),
            });

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
