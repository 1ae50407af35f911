//! Business logic service layer

mod dns_publishing;
mod in_flight;
mod key_service;
mod lifecycle_service;
mod relay_service;

pub use in_flight::{InFlightRuns, RunClaim};
pub use lifecycle_service::DomainLifecycleCoordinator;

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use domain_activator_provider::{DnsRecordPublisher, RelayAuthorizer};
use domain_activator_toolbox::PropagationVerifier;

use crate::crypto::{dkim::DEFAULT_KEY_SIZE, KeyMaterialGenerator, PBKDF2_ITERATIONS};
use crate::traits::{DkimKeyRepository, DomainRepository, InboxCredentialRepository};

/// Knobs of the activation pipeline.
#[derive(Clone)]
pub struct PipelineSettings {
    /// DNS-provider account zones are created under
    pub account_id: String,
    /// Sending IP, published in SPF (and the A record)
    pub server_ip: Ipv4Addr,
    /// MX target
    pub mail_host: String,
    pub mx_priority: u16,
    /// `rua=mailto:` address of the DMARC record
    pub dmarc_report_email: String,
    pub dkim_selector: String,
    pub dkim_key_size: u32,
    /// Password the DKIM private keys are sealed with
    pub key_encryption_key: String,
    pub key_encryption_iterations: u32,
    pub propagation_timeout: Duration,
    pub propagation_interval: Duration,
    /// Publish an apex A record pointing at `server_ip`
    pub publish_a_record: bool,
    /// Publishing runs after which a domain is marked failed
    pub max_publish_attempts: u32,
    /// Relay calls per operation before giving up
    pub relay_attempts: u32,
    pub relay_retry_delay: Duration,
    /// Call `reload_config` after each relay change and gate `active` on it
    pub relay_requires_reload: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            server_ip: Ipv4Addr::UNSPECIFIED,
            mail_host: String::new(),
            mx_priority: 10,
            dmarc_report_email: String::new(),
            dkim_selector: "mail2025".to_string(),
            dkim_key_size: DEFAULT_KEY_SIZE,
            key_encryption_key: String::new(),
            key_encryption_iterations: PBKDF2_ITERATIONS,
            propagation_timeout: Duration::from_secs(60),
            propagation_interval: Duration::from_secs(5),
            publish_a_record: false,
            max_publish_attempts: 3,
            relay_attempts: 3,
            relay_retry_delay: Duration::from_secs(1),
            relay_requires_reload: false,
        }
    }
}

impl fmt::Debug for PipelineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineSettings")
            .field("account_id", &self.account_id)
            .field("server_ip", &self.server_ip)
            .field("mail_host", &self.mail_host)
            .field("mx_priority", &self.mx_priority)
            .field("dmarc_report_email", &self.dmarc_report_email)
            .field("dkim_selector", &self.dkim_selector)
            .field("dkim_key_size", &self.dkim_key_size)
            .field("key_encryption_key", &"<redacted>")
            .field("propagation_timeout", &self.propagation_timeout)
            .field("propagation_interval", &self.propagation_interval)
            .field("publish_a_record", &self.publish_a_record)
            .field("max_publish_attempts", &self.max_publish_attempts)
            .field("relay_attempts", &self.relay_attempts)
            .field("relay_requires_reload", &self.relay_requires_reload)
            .finish_non_exhaustive()
    }
}

/// Service context - holds all dependencies
///
/// The application layer builds this and injects its storage and upstream clients.
pub struct PipelineContext {
    pub domain_repository: Arc<dyn DomainRepository>,
    pub dkim_key_repository: Arc<dyn DkimKeyRepository>,
    pub inbox_repository: Arc<dyn InboxCredentialRepository>,
    pub publisher: Arc<dyn DnsRecordPublisher>,
    pub relay: Arc<dyn RelayAuthorizer>,
    pub verifier: PropagationVerifier,
    pub key_generator: Arc<dyn KeyMaterialGenerator>,
    pub settings: PipelineSettings,
    /// Process-wide shutdown; every run's token is a child of it
    pub shutdown: CancellationToken,
}

impl PipelineContext {
    /// Create a service context
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        domain_repository: Arc<dyn DomainRepository>,
        dkim_key_repository: Arc<dyn DkimKeyRepository>,
        inbox_repository: Arc<dyn InboxCredentialRepository>,
        publisher: Arc<dyn DnsRecordPublisher>,
        relay: Arc<dyn RelayAuthorizer>,
        verifier: PropagationVerifier,
        key_generator: Arc<dyn KeyMaterialGenerator>,
        settings: PipelineSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            domain_repository,
            dkim_key_repository,
            inbox_repository,
            publisher,
            relay,
            verifier,
            key_generator,
            settings,
            shutdown,
        }
    }
}
