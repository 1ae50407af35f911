//! # domain-activator-provider
//!
//! Upstream API bindings used by the domain activation pipeline.
//!
//! ## Upstreams
//!
//! | Upstream | Feature Flag | Trait | Auth Method |
//! |----------|-------------|-------|-------------|
//! | [Cloudflare](https://www.cloudflare.com/) DNS | `cloudflare` | [`DnsRecordPublisher`] | Bearer Token + `X-Auth-Email` |
//! | [KumoMTA](https://kumomta.com/) admin API | `kumo` | [`RelayAuthorizer`] | HTTP Basic |
//!
//! ## Feature Flags
//!
//! - **`all-providers`** *(default)*: both clients.
//! - **`native-tls`** *(default)* / **`rustls`**: TLS backend for `reqwest`.
//!
//! ## Transport
//!
//! Every call goes through [`ApiTransport`]: a request timeout (30s by default), and
//! exponential backoff on transient failures (HTTP 429/502/503/504, connection
//! errors, timeouts). The wait before retry *k* is `base × 2^(k-1)` with a 2s base and at
//! most 5 retries. Running out of retries yields [`ProviderError::RetriesExhausted`],
//! which is distinct from an upstream rejection. Backoff sleeps stop as soon as the
//! shutdown token passed to the builder is cancelled.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::net::Ipv4Addr;
//! use domain_activator_provider::{CloudflarePublisher, DnsRecordPublisher};
//!
//! # async fn example() -> domain_activator_provider::Result<()> {
//! let publisher = CloudflarePublisher::builder("token".to_string())
//!     .auth_email("ops@example.com")
//!     .build()?;
//!
//! let zone = publisher.create_zone("acme-demo.test", "account-id").await?;
//! publisher
//!     .create_spf_record(&zone.id, "acme-demo.test", Ipv4Addr::new(203, 0, 113, 10))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod http_client;
mod providers;
mod traits;
mod types;
mod utils;

pub use error::{ProviderError, Result};

pub use http_client::{
    ApiTransport, RetryPolicy, TransportConfig, create_http_client, retry_with_backoff,
};

pub use traits::{DnsRecordPublisher, RelayAuthorizer};

pub use types::{
    DEFAULT_RECORD_TTL, DmarcPolicy, DnsRecordType, PublishedRecord, RecordPurpose, RecordSpec,
    RelayCredential, RelayStatus, ZoneInfo, dkim_record_name, dmarc_record_name, dmarc_value,
    spf_value,
};

pub use utils::log_sanitizer::{redact_secret, truncate_for_log};

#[cfg(feature = "cloudflare")]
pub use providers::{CloudflarePublisher, CloudflarePublisherBuilder};

#[cfg(feature = "kumo")]
pub use providers::{KumoRelayClient, KumoRelayClientBuilder};
