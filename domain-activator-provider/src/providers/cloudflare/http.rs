//! Cloudflare request plumbing

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ProviderError, Result};
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};
use crate::utils::log_sanitizer::truncate_for_log;

use super::{CloudflarePublisher, CloudflareResponse};

impl CloudflarePublisher {
    /// Send one API call through the transport and unwrap the v4 envelope.
    ///
    /// `success: false` (or any non-2xx status the transport did not retry) is mapped
    /// through [`ProviderErrorMapper`] using the first entry of `errors[]`.
    pub(crate) async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        context: ErrorContext,
    ) -> Result<CloudflareResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.api_base);

        let mut builder = self
            .transport
            .client()
            .request(method.clone(), &url)
            .bearer_auth(&self.api_token);
        if let Some(email) = &self.auth_email {
            builder = builder.header("X-Auth-Email", email);
        }
        if let Some(body) = body {
            let body_json = serde_json::to_string(body).map_err(|e| {
                ProviderError::SerializationError {
                    provider: self.provider_name().to_string(),
                    detail: e.to_string(),
                }
            })?;
            log::debug!(
                "[{}] Request Body: {}",
                self.provider_name(),
                truncate_for_log(&body_json)
            );
            builder = builder
                .header("Content-Type", "application/json")
                .body(body_json);
        }

        let (status, text) = self
            .transport
            .execute(builder, method.as_str(), path)
            .await?;

        let envelope: CloudflareResponse<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) if (200..300).contains(&status) => return Err(self.parse_error(e)),
            Err(_) => {
                // Non-JSON error page (proxy, load balancer)
                let err = self.map_error(
                    RawApiError::new(Some(status), truncate_for_log(&text)),
                    context,
                );
                self.log_failure(&method, path, &err);
                return Err(err);
            }
        };

        if envelope.success && (200..300).contains(&status) {
            return Ok(envelope);
        }

        let raw = envelope
            .errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map_or_else(
                || RawApiError::new(Some(status), format!("HTTP {status}")),
                |e| RawApiError::with_code(Some(status), e.code.to_string(), e.message.clone()),
            );
        let err = self.map_error(raw, context);
        self.log_failure(&method, path, &err);
        Err(err)
    }

    /// Like [`request`](Self::request) but requires a `result` payload.
    pub(crate) async fn request_result<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        context: ErrorContext,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(method, path, body, context)
            .await?
            .result
            .ok_or_else(|| self.parse_error("missing result field in response"))
    }

    fn log_failure(&self, method: &Method, path: &str, err: &ProviderError) {
        if err.is_expected() {
            log::warn!("[{}] {method} {path} rejected: {err}", self.provider_name());
        } else {
            log::error!("[{}] {method} {path} failed: {err}", self.provider_name());
        }
    }
}
