//! Application bootstrap for the domain activation pipeline.
//!
//! Provides [`AppConfig`] (TOML + environment), `AppState` (the wired coordinator) and
//! `AppStateBuilder` (adapter injection). Frontends construct the state once at startup.

pub mod adapters;
pub mod config;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use domain_activator_core::crypto::{KeyMaterialGenerator, RsaKeyGenerator};
use domain_activator_core::error::{CoreError, CoreResult};
use domain_activator_core::traits::{
    DkimKeyRepository, DomainRepository, InboxCredentialRepository,
};
use domain_activator_core::{DomainLifecycleCoordinator, PipelineContext};
use domain_activator_provider::{
    CloudflarePublisher, DnsRecordPublisher, KumoRelayClient, RelayAuthorizer,
};
use domain_activator_toolbox::{HickoryTxtResolver, PropagationVerifier, TxtResolver};

pub use config::{AppConfig, ConfigError};

/// Wired application state.
///
/// Holds the coordinator and the process-wide shutdown token. Cancelling the token
/// stops every in-flight pipeline run and any transport backoff.
pub struct AppState {
    pub config: AppConfig,
    pub coordinator: Arc<DomainLifecycleCoordinator>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Open the `SQLite` store named in `config` and wire the real upstreams.
    #[cfg(feature = "sqlite-store")]
    pub async fn open(config: AppConfig) -> CoreResult<Self> {
        let store = Arc::new(adapters::SqliteStore::new(&config.storage.database_path).await?);
        AppStateBuilder::new(config).sqlite_store(store).build()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Stop in-flight runs and backoff sleeps.
    pub fn shutdown(&self) {
        log::info!("[app] shutdown requested");
        self.shutdown.cancel();
    }
}

/// Builder for constructing `AppState` with injected adapters.
///
/// # Required adapters
/// - `domain_repository`, `dkim_key_repository`, `inbox_repository` (or `sqlite_store`)
///
/// # Optional
/// - `publisher`: defaults to `CloudflarePublisher` from `config.cloudflare`
/// - `relay`: defaults to `KumoRelayClient` from `config.relay`
/// - `txt_resolver`: defaults to hickory (configured nameservers, else system)
/// - `key_generator`: defaults to `RsaKeyGenerator`
pub struct AppStateBuilder {
    config: AppConfig,
    domain_repository: Option<Arc<dyn DomainRepository>>,
    dkim_key_repository: Option<Arc<dyn DkimKeyRepository>>,
    inbox_repository: Option<Arc<dyn InboxCredentialRepository>>,
    publisher: Option<Arc<dyn DnsRecordPublisher>>,
    relay: Option<Arc<dyn RelayAuthorizer>>,
    txt_resolver: Option<Arc<dyn TxtResolver>>,
    key_generator: Option<Arc<dyn KeyMaterialGenerator>>,
    shutdown: CancellationToken,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            domain_repository: None,
            dkim_key_repository: None,
            inbox_repository: None,
            publisher: None,
            relay: None,
            txt_resolver: None,
            key_generator: None,
            shutdown: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn domain_repository(mut self, repo: Arc<dyn DomainRepository>) -> Self {
        self.domain_repository = Some(repo);
        self
    }

    #[must_use]
    pub fn dkim_key_repository(mut self, repo: Arc<dyn DkimKeyRepository>) -> Self {
        self.dkim_key_repository = Some(repo);
        self
    }

    #[must_use]
    pub fn inbox_repository(mut self, repo: Arc<dyn InboxCredentialRepository>) -> Self {
        self.inbox_repository = Some(repo);
        self
    }

    /// Use one `SqliteStore` for all three repositories.
    #[cfg(feature = "sqlite-store")]
    #[must_use]
    pub fn sqlite_store(self, store: Arc<adapters::SqliteStore>) -> Self {
        self.domain_repository(store.clone())
            .dkim_key_repository(store.clone())
            .inbox_repository(store)
    }

    #[must_use]
    pub fn publisher(mut self, publisher: Arc<dyn DnsRecordPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    #[must_use]
    pub fn relay(mut self, relay: Arc<dyn RelayAuthorizer>) -> Self {
        self.relay = Some(relay);
        self
    }

    #[must_use]
    pub fn txt_resolver(mut self, resolver: Arc<dyn TxtResolver>) -> Self {
        self.txt_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn key_generator(mut self, generator: Arc<dyn KeyMaterialGenerator>) -> Self {
        self.key_generator = Some(generator);
        self
    }

    #[must_use]
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Build the `AppState`.
    ///
    /// # Errors
    /// Returns `CoreError::ValidationError` if a required adapter is missing or the
    /// config does not yield valid pipeline settings, and `CoreError::Provider` if an
    /// HTTP client cannot be constructed.
    pub fn build(self) -> CoreResult<AppState> {
        let domain_repository = self.domain_repository.ok_or_else(|| {
            CoreError::ValidationError("domain_repository is required".to_string())
        })?;
        let dkim_key_repository = self.dkim_key_repository.ok_or_else(|| {
            CoreError::ValidationError("dkim_key_repository is required".to_string())
        })?;
        let inbox_repository = self.inbox_repository.ok_or_else(|| {
            CoreError::ValidationError("inbox_repository is required".to_string())
        })?;

        let config = self.config;
        let settings = config
            .pipeline_settings()
            .map_err(|e| CoreError::ValidationError(e.to_string()))?;

        let publisher: Arc<dyn DnsRecordPublisher> = match self.publisher {
            Some(publisher) => publisher,
            None => Arc::new(build_publisher(&config, &self.shutdown)?),
        };
        let relay: Arc<dyn RelayAuthorizer> = match self.relay {
            Some(relay) => relay,
            None => Arc::new(build_relay(&config, &self.shutdown)?),
        };
        let resolver: Arc<dyn TxtResolver> = match self.txt_resolver {
            Some(resolver) => resolver,
            None => {
                let nameservers = config
                    .nameservers()
                    .map_err(|e| CoreError::ValidationError(e.to_string()))?;
                if nameservers.is_empty() {
                    Arc::new(HickoryTxtResolver::system())
                } else {
                    Arc::new(HickoryTxtResolver::with_nameservers(&nameservers))
                }
            }
        };
        let key_generator: Arc<dyn KeyMaterialGenerator> = match self.key_generator {
            Some(generator) => generator,
            None => Arc::new(RsaKeyGenerator::new()),
        };

        log::info!(
            "[app] pipeline ready: dns={}, relay={}, selector={}",
            publisher.id(),
            relay.id(),
            settings.dkim_selector
        );

        let ctx = Arc::new(PipelineContext::new(
            domain_repository,
            dkim_key_repository,
            inbox_repository,
            publisher,
            relay,
            PropagationVerifier::new(resolver),
            key_generator,
            settings,
            self.shutdown.clone(),
        ));

        Ok(AppState {
            config,
            coordinator: Arc::new(DomainLifecycleCoordinator::new(ctx)),
            shutdown: self.shutdown,
        })
    }
}

fn build_publisher(
    config: &AppConfig,
    shutdown: &CancellationToken,
) -> CoreResult<CloudflarePublisher> {
    let cf = &config.cloudflare;
    let mut builder = CloudflarePublisher::builder(cf.api_token.clone())
        .transport_config(config.transport.clone())
        .shutdown_token(shutdown.clone());
    if let Some(email) = &cf.email {
        builder = builder.auth_email(email.clone());
    }
    if let Some(base) = &cf.api_base {
        builder = builder.api_base(base.clone());
    }
    Ok(builder.build()?)
}

fn build_relay(config: &AppConfig, shutdown: &CancellationToken) -> CoreResult<KumoRelayClient> {
    let relay = &config.relay;
    Ok(KumoRelayClient::builder(
        &relay.host,
        relay.port,
        relay.username.clone(),
        relay.password.clone(),
    )
    .transport_config(config.transport.clone())
    .shutdown_token(shutdown.clone())
    .build()?)
}
