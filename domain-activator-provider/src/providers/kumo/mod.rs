//! KumoMTA relay accept-list client
//!
//! Talks to the relay's admin HTTP endpoint (`https://<host>:<port>/api/admin/...`) with
//! basic auth. Every mutation is applied live by the relay; `reload_config` is the
//! escape hatch for deployments where that is not guaranteed.

mod error;
mod relay;
mod types;

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::http_client::{ApiTransport, RetryPolicy, TransportConfig};

pub(crate) const PROVIDER_NAME: &str = "kumo";

/// KumoMTA relay client
pub struct KumoRelayClient {
    pub(crate) transport: ApiTransport,
    pub(crate) base_url: String,
    pub(crate) username: String,
    pub(crate) password: String,
}

impl fmt::Debug for KumoRelayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KumoRelayClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// KumoMTA relay client builder
pub struct KumoRelayClientBuilder {
    base_url: String,
    username: String,
    password: String,
    transport: TransportConfig,
    retry_policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl KumoRelayClientBuilder {
    fn new(host: &str, port: u16, username: String, password: String) -> Self {
        Self {
            base_url: format!("https://{host}:{port}"),
            username,
            password,
            transport: TransportConfig::default(),
            // the coordinator owns relay retries
            retry_policy: RetryPolicy::none(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Override the computed `https://host:port` root.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn build(self) -> Result<KumoRelayClient> {
        let transport = ApiTransport::new(PROVIDER_NAME, &self.transport, self.shutdown)?
            .with_policy(self.retry_policy);
        Ok(KumoRelayClient {
            transport,
            base_url: self.base_url,
            username: self.username,
            password: self.password,
        })
    }
}

impl KumoRelayClient {
    pub fn builder(
        host: &str,
        port: u16,
        username: String,
        password: String,
    ) -> KumoRelayClientBuilder {
        KumoRelayClientBuilder::new(host, port, username, password)
    }
}
