//! Retrying HTTP transport shared by every upstream client.
//!
//! Each client builds its own `RequestBuilder` (auth headers, URL, JSON body) and hands
//! it to [`ApiTransport::execute`], which owns the uniform part of the flow:
//! - sending the request under the configured timeout
//! - classifying 429 / 502-504 / timeouts / connection failures as transient
//! - retrying transient failures with exponential backoff, bounded by [`RetryPolicy`]
//! - aborting backoff sleeps when the shutdown token fires
//!
//! Response-body interpretation stays with the caller, since every upstream has its own
//! error envelope.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, Result};
use crate::utils::log_sanitizer::truncate_for_log;

/// Default connect timeout (seconds).
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default request timeout (seconds).
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default number of retries after the initial attempt.
const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default backoff base (milliseconds).
const DEFAULT_RETRY_BASE_MS: u64 = 2_000;

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubled for every further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Wait before retry number `retry` (1-based): `base × 2^(retry-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        // 2^20 × base is already far past any sane budget
        let exponent = retry.saturating_sub(1).min(20);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }

    /// Sum of every backoff sleep when all retries are consumed.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries).fold(Duration::ZERO, |acc, retry| {
            acc.saturating_add(self.delay_for(retry))
        })
    }
}

/// Serializable transport settings, embedded in the application config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_MS,
        }
    }
}

impl TransportConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

/// Build a `reqwest::Client` with the configured timeouts.
pub fn create_http_client(config: &TransportConfig, provider: &str) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ProviderError::NetworkError {
            provider: provider.to_string(),
            detail: format!("Failed to create HTTP client: {e}"),
        })
}

/// HTTP client wrapper enforcing timeout, bounded retry and error translation.
#[derive(Debug, Clone)]
pub struct ApiTransport {
    client: Client,
    provider: &'static str,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl ApiTransport {
    pub fn new(
        provider: &'static str,
        config: &TransportConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            client: create_http_client(config, provider)?,
            provider,
            policy: config.retry_policy(),
            shutdown,
        })
    }

    /// Override the retry policy (the relay client uses a shorter budget).
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send `request` with retries and return `(status, body)`.
    ///
    /// Any status that is not transient is returned to the caller untouched, so the
    /// caller's envelope parser decides what a 4xx means. Only transient failures are
    /// retried; exhausting the policy yields [`ProviderError::RetriesExhausted`].
    pub async fn execute(
        &self,
        request: RequestBuilder,
        method: &str,
        target: &str,
    ) -> Result<(u16, String)> {
        if request.try_clone().is_none() {
            // Streaming bodies cannot be replayed
            log::warn!("[{}] Cannot clone request, disabling retry", self.provider);
            return self.execute_once(request, method, target).await;
        }

        retry_with_backoff(self.provider, &self.policy, &self.shutdown, |_attempt| {
            let req = request.try_clone();
            async move {
                match req {
                    Some(req) => self.execute_once(req, method, target).await,
                    None => Err(ProviderError::SerializationError {
                        provider: self.provider.to_string(),
                        detail: "request body cannot be replayed".to_string(),
                    }),
                }
            }
        })
        .await
    }

    /// Single attempt: send, classify transient statuses, read the body.
    async fn execute_once(
        &self,
        request: RequestBuilder,
        method: &str,
        target: &str,
    ) -> Result<(u16, String)> {
        let provider = self.provider;
        log::debug!("[{provider}] {method} {target}");

        let response = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                return Err(ProviderError::Cancelled { provider: provider.to_string() });
            }
            sent = request.send() => sent.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        provider: provider.to_string(),
                        detail: e.to_string(),
                    }
                } else {
                    ProviderError::NetworkError {
                        provider: provider.to_string(),
                        detail: e.to_string(),
                    }
                }
            })?,
        };

        let status_code = response.status().as_u16();
        log::debug!("[{provider}] Response Status: {status_code}");

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if status_code == 429 {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{provider}] Rate limited (HTTP 429), retry_after={retry_after:?}");
            return Err(ProviderError::RateLimited {
                provider: provider.to_string(),
                retry_after,
                raw_message: Some(truncate_for_log(&body)),
            });
        }

        if matches!(status_code, 502..=504) {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{provider}] Server busy (HTTP {status_code})");
            return Err(ProviderError::NetworkError {
                provider: provider.to_string(),
                detail: format!("HTTP {status_code}: {}", truncate_for_log(&body)),
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError {
                provider: provider.to_string(),
                detail: format!("Failed to read response body: {e}"),
            })?;

        log::debug!(
            "[{provider}] Response Body: {}",
            truncate_for_log(&response_text)
        );

        Ok((status_code, response_text))
    }

    /// Decode a JSON body, logging a truncated copy on failure.
    pub fn parse_json<T: DeserializeOwned>(&self, response_text: &str) -> Result<T> {
        parse_json(response_text, self.provider)
    }
}

/// Decode a JSON body, logging a truncated copy on failure.
pub fn parse_json<T: DeserializeOwned>(response_text: &str, provider: &str) -> Result<T> {
    serde_json::from_str(response_text).map_err(|e| {
        log::error!("[{provider}] JSON parse failed: {e}");
        log::error!(
            "[{provider}] Raw response: {}",
            truncate_for_log(response_text)
        );
        ProviderError::ParseError {
            provider: provider.to_string(),
            detail: e.to_string(),
        }
    })
}

/// Run `op` until it succeeds, fails permanently, or the retry budget runs out.
///
/// `op` receives the 1-based attempt number. Only [`ProviderError::is_transient`]
/// failures are retried. The wait before retry *k* is `policy.delay_for(k)`; the
/// sleep is raced against `shutdown` and yields [`ProviderError::Cancelled`] if the
/// token fires first.
pub async fn retry_with_backoff<T, F, Fut>(
    provider: &str,
    policy: &RetryPolicy,
    shutdown: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        if shutdown.is_cancelled() {
            return Err(ProviderError::Cancelled {
                provider: provider.to_string(),
            });
        }

        attempt += 1;
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(e),
        };

        // `attempt` failures so far, so the next retry is number `attempt`
        if attempt > policy.max_retries {
            log::error!("[{provider}] Giving up after {attempt} attempts: {err}");
            return Err(ProviderError::RetriesExhausted {
                provider: provider.to_string(),
                attempts: attempt,
                last_error: Box::new(err),
            });
        }

        let delay = policy.delay_for(attempt);
        log::warn!(
            "[{provider}] Request failed (retry {attempt}/{}), retrying in {:.1}s: {err}",
            policy.max_retries,
            delay.as_secs_f32(),
        );

        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                log::info!("[{provider}] Backoff interrupted by shutdown");
                return Err(ProviderError::Cancelled {
                    provider: provider.to_string(),
                });
            }
            () = tokio::time::sleep(delay) => {}
        }
    }
}
