//! Cloudflare DNS publisher (API v4)

mod error;
mod http;
mod publisher;
mod types;

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::http_client::{ApiTransport, RetryPolicy, TransportConfig};

pub(crate) use types::{
    CloudflareDnsRecord, CloudflareRecordBody, CloudflareResponse, CloudflareZone,
    CreateZoneBody,
};

pub(crate) const CF_API_BASE: &str = "https://api.cloudflare.com/client/v4";
pub(crate) const PROVIDER_NAME: &str = "cloudflare";

/// Cloudflare DNS publisher
pub struct CloudflarePublisher {
    pub(crate) transport: ApiTransport,
    pub(crate) api_base: String,
    pub(crate) api_token: String,
    pub(crate) auth_email: Option<String>,
}

impl fmt::Debug for CloudflarePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflarePublisher")
            .field("api_base", &self.api_base)
            .field("auth_email", &self.auth_email)
            .field("policy", &self.transport.policy())
            .finish_non_exhaustive()
    }
}

/// Cloudflare publisher builder
pub struct CloudflarePublisherBuilder {
    api_token: String,
    auth_email: Option<String>,
    api_base: String,
    transport: TransportConfig,
    retry_policy: Option<RetryPolicy>,
    shutdown: CancellationToken,
}

impl CloudflarePublisherBuilder {
    fn new(api_token: String) -> Self {
        Self {
            api_token,
            auth_email: None,
            api_base: CF_API_BASE.to_string(),
            transport: TransportConfig::default(),
            retry_policy: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Account email sent as `X-Auth-Email`.
    pub fn auth_email(mut self, email: impl Into<String>) -> Self {
        self.auth_email = Some(email.into());
        self
    }

    /// Override the API root (tests point this at a mock server).
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Token whose cancellation aborts pending backoff sleeps.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn build(self) -> Result<CloudflarePublisher> {
        let mut transport = ApiTransport::new(PROVIDER_NAME, &self.transport, self.shutdown)?;
        if let Some(policy) = self.retry_policy {
            transport = transport.with_policy(policy);
        }
        Ok(CloudflarePublisher {
            transport,
            api_base: self.api_base,
            api_token: self.api_token,
            auth_email: self.auth_email,
        })
    }
}

impl CloudflarePublisher {
    pub fn new(api_token: String) -> Result<Self> {
        Self::builder(api_token).build()
    }

    pub fn builder(api_token: String) -> CloudflarePublisherBuilder {
        CloudflarePublisherBuilder::new(api_token)
    }
}
