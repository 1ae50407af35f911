//! `RelayAuthorizer` implementation for KumoMTA

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use crate::error::{ProviderError, Result};
use crate::providers::common::{encode_segment, normalize_domain_name};
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError, RelayAuthorizer};
use crate::types::{RelayCredential, RelayStatus};
use crate::utils::log_sanitizer::truncate_for_log;

use super::types::{AddCredentialsBody, CredentialEntry, KumoErrorBody, RelayDomainResponse};
use super::{KumoRelayClient, PROVIDER_NAME};

type NoBody = ();

impl KumoRelayClient {
    /// Send one admin call and return `(status, body)` without judging the status.
    async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(u16, String)> {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self
            .transport
            .client()
            .request(method.clone(), &url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(body) = body {
            let json = serde_json::to_string(body).map_err(|e| {
                ProviderError::SerializationError {
                    provider: self.provider_name().to_string(),
                    detail: e.to_string(),
                }
            })?;
            builder = builder
                .header("Content-Type", "application/json")
                .body(json);
        }
        self.transport.execute(builder, method.as_str(), path).await
    }

    fn reject(&self, status: u16, text: &str, context: ErrorContext) -> ProviderError {
        let body: KumoErrorBody = serde_json::from_str(text).unwrap_or_default();
        let message = body
            .error
            .unwrap_or_else(|| truncate_for_log(text));
        let raw = match body.code {
            Some(code) => RawApiError::with_code(Some(status), code, message),
            None => RawApiError::new(Some(status), message),
        };
        let err = self.map_error(raw, context);
        if err.is_expected() {
            log::warn!("[{PROVIDER_NAME}] {err}");
        } else {
            log::error!("[{PROVIDER_NAME}] {err}");
        }
        err
    }

    fn domain_path(domain: &str) -> String {
        format!(
            "/api/admin/relay/{}",
            encode_segment(&normalize_domain_name(domain))
        )
    }
}

#[async_trait]
impl RelayAuthorizer for KumoRelayClient {
    fn id(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn authorize(&self, domain: &str, credentials: &[RelayCredential]) -> Result<bool> {
        let body = AddCredentialsBody {
            credentials: credentials
                .iter()
                .map(|c| CredentialEntry {
                    username: &c.username,
                    password_hash: &c.credential_hash,
                })
                .collect(),
        };
        let path = format!("{}/credentials", Self::domain_path(domain));
        let (status, text) = self.call(Method::POST, &path, Some(&body)).await?;

        match status {
            200..=299 => {}
            // already present: the relay keeps a single entry per username
            409 => log::debug!("[{PROVIDER_NAME}] {domain}: credentials already present"),
            _ => return Err(self.reject(status, &text, ErrorContext::domain(domain))),
        }

        log::info!(
            "[{PROVIDER_NAME}] Authorized {domain} with {} inbox(es)",
            credentials.len()
        );
        Ok(true)
    }

    async fn deauthorize(&self, domain: &str, username: &str) -> Result<bool> {
        let path = format!(
            "{}/credentials/{}",
            Self::domain_path(domain),
            encode_segment(username)
        );
        let (status, text) = self.call::<NoBody>(Method::DELETE, &path, None).await?;

        match status {
            200..=299 => log::info!("[{PROVIDER_NAME}] Removed {username}@{domain} from relay"),
            404 => log::debug!("[{PROVIDER_NAME}] {username}@{domain} was not in the relay"),
            _ => return Err(self.reject(status, &text, ErrorContext::domain(domain))),
        }
        Ok(true)
    }

    async fn revoke_domain(&self, domain: &str) -> Result<bool> {
        let path = Self::domain_path(domain);
        let (status, text) = self.call::<NoBody>(Method::DELETE, &path, None).await?;

        match status {
            200..=299 => log::info!("[{PROVIDER_NAME}] Revoked {domain} from relay"),
            404 => log::debug!("[{PROVIDER_NAME}] {domain} was not in the relay"),
            _ => return Err(self.reject(status, &text, ErrorContext::domain(domain))),
        }
        Ok(true)
    }

    async fn reload_config(&self) -> Result<bool> {
        let (status, text) = self
            .call::<NoBody>(Method::POST, "/api/admin/reload", None)
            .await?;
        if !(200..300).contains(&status) {
            return Err(self.reject(status, &text, ErrorContext::default()));
        }
        log::info!("[{PROVIDER_NAME}] Reloaded relay configuration");
        Ok(true)
    }

    async fn status(&self, domain: &str) -> Result<RelayStatus> {
        let (status, text) = self
            .call::<NoBody>(Method::GET, &Self::domain_path(domain), None)
            .await?;

        match status {
            200..=299 => {
                let body: RelayDomainResponse = self.transport.parse_json(&text)?;
                Ok(RelayStatus {
                    domain: normalize_domain_name(&body.domain),
                    authorized: body.status.as_deref().is_none_or(|s| s == "active"),
                    usernames: body.inboxes,
                })
            }
            404 => Ok(RelayStatus {
                domain: normalize_domain_name(domain),
                authorized: false,
                usernames: Vec::new(),
            }),
            _ => Err(self.reject(status, &text, ErrorContext::domain(domain))),
        }
    }
}
