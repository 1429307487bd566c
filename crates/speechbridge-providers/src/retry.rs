//! Retry wrapper for translation calls.
//!
//! Retryable failures (transport errors, 408/429/5xx, undecodable bodies) are
//! retried with a linear or exponential delay; anything else returns at once.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use speechbridge_core::config::{BackoffKind, RetryConfig};
use tracing::{info, warn};

use crate::{ProviderError, Translation, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: BackoffKind,
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
            base_delay: Duration::from_millis(config.base_delay_ms),
            backoff: config.backoff,
        }
    }

    /// Delay before the 1-based `attempt`. The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        match self.backoff {
            BackoffKind::Linear => self.base_delay * (attempt - 1),
            BackoffKind::Exponential => self.base_delay * 2u32.saturating_pow(attempt - 2),
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(provider = label, attempt, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_before(attempt + 1);
                    warn!(
                        provider = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// A translator that retries the wrapped translator under a [`RetryPolicy`].
pub struct RetryingTranslator<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Translator> RetryingTranslator<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: Translator> Translator for RetryingTranslator<T> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn translate(
        &self,
        text: &str,
        targets: &[String],
        source: Option<&str>,
    ) -> Result<Translation, ProviderError> {
        self.policy
            .run(self.inner.id(), || self.inner.translate(text, targets, source))
            .await
    }
}
