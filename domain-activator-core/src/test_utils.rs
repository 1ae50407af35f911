//! Test helper module
//!
//! In-memory mocks for the repositories and upstreams, plus a ready-made pipeline.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use domain_activator_provider::{
    DnsRecordPublisher, DnsRecordType, ProviderError, PublishedRecord, RecordSpec,
    Result as ProviderResult,
    RelayAuthorizer, RelayCredential, RelayStatus, ZoneInfo,
};
use domain_activator_toolbox::{PropagationVerifier, ToolboxResult, TxtLookup, TxtResolver};

use crate::crypto::{GeneratedKeyPair, KeyMaterialGenerator, RsaKeyGenerator};
use crate::error::{CoreError, CoreResult};
use crate::services::{DomainLifecycleCoordinator, PipelineContext, PipelineSettings};
use crate::traits::{DkimKeyRepository, DomainRepository, InboxCredentialRepository};
use crate::types::{DkimKey, Domain, InboxCredential, RegistrationRecord};

pub const TEST_DOMAIN: &str = "acme-demo.test";
pub const TEST_TENANT: &str = "tenant-1";
pub const SERVER_IP: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 10);
pub const MAIL_HOST: &str = "mail.acme-demo.test";
pub const REPORT_EMAIL: &str = "dmarc-reports@acme-demo.test";

// ===== MockDomainRepository =====

pub struct MockDomainRepository {
    domains: RwLock<HashMap<String, Domain>>,
    /// If Some, save returns this error
    save_error: RwLock<Option<String>>,
}

impl MockDomainRepository {
    pub fn new() -> Self {
        Self {
            domains: RwLock::new(HashMap::new()),
            save_error: RwLock::new(None),
        }
    }

    pub async fn set_save_error(&self, err: Option<String>) {
        *self.save_error.write().await = err;
    }

    pub async fn get(&self, id: &str) -> Option<Domain> {
        self.domains.read().await.get(id).cloned()
    }
}

#[async_trait]
impl DomainRepository for MockDomainRepository {
    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Domain>> {
        Ok(self.domains.read().await.get(id).cloned())
    }

    async fn find_by_name(&self, tenant_id: &str, name: &str) -> CoreResult<Option<Domain>> {
        Ok(self
            .domains
            .read()
            .await
            .values()
            .find(|d| d.tenant_id == tenant_id && d.name == name)
            .cloned())
    }

    async fn find_by_tenant(&self, tenant_id: &str) -> CoreResult<Vec<Domain>> {
        Ok(self
            .domains
            .read()
            .await
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn save(&self, domain: &Domain) -> CoreResult<()> {
        if let Some(ref msg) = *self.save_error.read().await {
            return Err(CoreError::StorageError(msg.clone()));
        }
        self.domains
            .write()
            .await
            .insert(domain.id.clone(), domain.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> CoreResult<()> {
        self.domains.write().await.remove(id);
        Ok(())
    }
}

// ===== MockDkimKeyRepository =====

pub struct MockDkimKeyRepository {
    keys: RwLock<Vec<DkimKey>>,
}

impl MockDkimKeyRepository {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DkimKeyRepository for MockDkimKeyRepository {
    async fn find_active(&self, domain_id: &str, selector: &str) -> CoreResult<Option<DkimKey>> {
        Ok(self
            .keys
            .read()
            .await
            .iter()
            .find(|k| k.domain_id == domain_id && k.selector == selector && k.active)
            .cloned())
    }

    async fn find_by_domain(&self, domain_id: &str) -> CoreResult<Vec<DkimKey>> {
        Ok(self
            .keys
            .read()
            .await
            .iter()
            .filter(|k| k.domain_id == domain_id)
            .cloned()
            .collect())
    }

    async fn save(&self, key: &DkimKey) -> CoreResult<()> {
        let mut keys = self.keys.write().await;
        match keys.iter_mut().find(|k| k.id == key.id) {
            Some(existing) => *existing = key.clone(),
            None => keys.push(key.clone()),
        }
        Ok(())
    }

    async fn delete_by_domain(&self, domain_id: &str) -> CoreResult<()> {
        self.keys.write().await.retain(|k| k.domain_id != domain_id);
        Ok(())
    }
}

// ===== MockInboxRepository =====

pub struct MockInboxRepository {
    inboxes: RwLock<BTreeMap<(String, String), InboxCredential>>,
}

impl MockInboxRepository {
    pub fn new() -> Self {
        Self {
            inboxes: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl InboxCredentialRepository for MockInboxRepository {
    async fn find_by_domain(&self, domain_id: &str) -> CoreResult<Vec<InboxCredential>> {
        Ok(self
            .inboxes
            .read()
            .await
            .values()
            .filter(|i| i.domain_id == domain_id)
            .cloned()
            .collect())
    }

    async fn save(&self, credential: &InboxCredential) -> CoreResult<()> {
        self.inboxes.write().await.insert(
            (credential.domain_id.clone(), credential.username.clone()),
            credential.clone(),
        );
        Ok(())
    }

    async fn delete(&self, domain_id: &str, username: &str) -> CoreResult<()> {
        self.inboxes
            .write()
            .await
            .remove(&(domain_id.to_string(), username.to_string()));
        Ok(())
    }

    async fn delete_by_domain(&self, domain_id: &str) -> CoreResult<()> {
        self.inboxes
            .write()
            .await
            .retain(|(d, _), _| d != domain_id);
        Ok(())
    }
}

// ===== MockPublisher =====

/// In-memory DNS provider enforcing natural-key uniqueness like the real one.
pub struct MockPublisher {
    zones: RwLock<HashMap<String, ZoneInfo>>,
    records: RwLock<BTreeMap<String, PublishedRecord>>,
    /// Record name -> error returned by `create_record`
    record_failures: RwLock<HashMap<String, ProviderError>>,
    zone_failure: RwLock<Option<ProviderError>>,
    writes: AtomicUsize,
    next_id: AtomicU32,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            zones: RwLock::new(HashMap::new()),
            records: RwLock::new(BTreeMap::new()),
            record_failures: RwLock::new(HashMap::new()),
            zone_failure: RwLock::new(None),
            writes: AtomicUsize::new(0),
            next_id: AtomicU32::new(1),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Provider write calls so far, failed ones included.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn fail_record(&self, name: &str, err: ProviderError) {
        self.record_failures
            .write()
            .await
            .insert(name.to_string(), err);
    }

    pub async fn clear_failures(&self) {
        self.record_failures.write().await.clear();
        *self.zone_failure.write().await = None;
    }

    pub async fn fail_zone(&self, err: ProviderError) {
        *self.zone_failure.write().await = Some(err);
    }

    pub async fn records_named(&self, name: &str) -> Vec<PublishedRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn zone_count(&self) -> usize {
        self.zones.read().await.len()
    }

    fn to_record(id: String, zone_id: &str, spec: &RecordSpec) -> PublishedRecord {
        PublishedRecord {
            id,
            zone_id: zone_id.to_string(),
            record_type: spec.record_type,
            name: spec.name.clone(),
            content: spec.content.clone(),
            ttl: spec.ttl,
            priority: spec.priority,
        }
    }
}

#[async_trait]
impl DnsRecordPublisher for MockPublisher {
    fn id(&self) -> &'static str {
        "mock-dns"
    }

    async fn create_zone(&self, domain: &str, _account_id: &str) -> ProviderResult<ZoneInfo> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.zone_failure.read().await.clone() {
            return Err(err);
        }
        let mut zones = self.zones.write().await;
        if zones.values().any(|z| z.name == domain) {
            return Err(ProviderError::RecordExists {
                provider: "mock-dns".into(),
                record_name: domain.to_string(),
                raw_message: Some("zone already exists".into()),
            });
        }
        let zone = ZoneInfo {
            id: self.next_id("zone"),
            name: domain.to_string(),
            name_servers: vec!["ada.ns.example.net".into(), "bob.ns.example.net".into()],
            status: "pending".into(),
        };
        zones.insert(zone.id.clone(), zone.clone());
        Ok(zone)
    }

    async fn find_zone(&self, domain: &str) -> ProviderResult<Option<ZoneInfo>> {
        Ok(self
            .zones
            .read()
            .await
            .values()
            .find(|z| z.name == domain)
            .cloned())
    }

    async fn delete_zone(&self, zone_id: &str) -> ProviderResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.zones.write().await.remove(zone_id);
        self.records.write().await.retain(|_, r| r.zone_id != zone_id);
        Ok(())
    }

    async fn create_record(&self, zone_id: &str, spec: &RecordSpec) -> ProviderResult<PublishedRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.record_failures.read().await.get(&spec.name).cloned() {
            return Err(err);
        }
        let mut records = self.records.write().await;
        if records.values().any(|r| {
            r.zone_id == zone_id
                && r.name == spec.name
                && r.record_type == spec.record_type
                && r.content == spec.content
        }) {
            return Err(ProviderError::RecordExists {
                provider: "mock-dns".into(),
                record_name: spec.name.clone(),
                raw_message: Some("An identical record already exists.".into()),
            });
        }
        let record = Self::to_record(self.next_id("rec"), zone_id, spec);
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: DnsRecordType,
    ) -> ProviderResult<Vec<PublishedRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.zone_id == zone_id && r.name == name && r.record_type == record_type)
            .cloned()
            .collect())
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> ProviderResult<PublishedRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.write().await;
        if !records.contains_key(record_id) {
            return Err(ProviderError::RecordNotFound {
                provider: "mock-dns".into(),
                record_id: record_id.to_string(),
                raw_message: None,
            });
        }
        let record = Self::to_record(record_id.to_string(), zone_id, spec);
        records.insert(record_id.to_string(), record.clone());
        Ok(record)
    }

    async fn delete_record(&self, _zone_id: &str, record_id: &str) -> ProviderResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        match self.records.write().await.remove(record_id) {
            Some(_) => Ok(()),
            None => Err(ProviderError::RecordNotFound {
                provider: "mock-dns".into(),
                record_id: record_id.to_string(),
                raw_message: None,
            }),
        }
    }
}

// ===== MockRelay =====

/// Relay accept list: domain -> username -> credential hash.
pub struct MockRelay {
    accept_list: RwLock<HashMap<String, BTreeMap<String, String>>>,
    authorized_domains: RwLock<HashSet<String>>,
    /// Fail this many upcoming calls with a transient error
    failures_left: AtomicU32,
    authorize_calls: AtomicU32,
    reload_calls: AtomicU32,
}

impl MockRelay {
    pub fn new() -> Self {
        Self {
            accept_list: RwLock::new(HashMap::new()),
            authorized_domains: RwLock::new(HashSet::new()),
            failures_left: AtomicU32::new(0),
            authorize_calls: AtomicU32::new(0),
            reload_calls: AtomicU32::new(0),
        }
    }

    pub fn fail_next(&self, calls: u32) {
        self.failures_left.store(calls, Ordering::SeqCst);
    }

    fn take_failure(&self) -> ProviderResult<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(ProviderError::RetriesExhausted {
                provider: "mock-relay".into(),
                attempts: 1,
                last_error: Box::new(ProviderError::NetworkError {
                    provider: "mock-relay".into(),
                    detail: "connection refused".into(),
                }),
            });
        }
        Ok(())
    }

    pub fn authorize_calls(&self) -> u32 {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn reload_calls(&self) -> u32 {
        self.reload_calls.load(Ordering::SeqCst)
    }

    pub async fn is_authorized(&self, domain: &str) -> bool {
        self.authorized_domains.read().await.contains(domain)
    }

    pub async fn entries(&self, domain: &str) -> Vec<(String, String)> {
        self.accept_list
            .read()
            .await
            .get(domain)
            .map(|m| m.iter().map(|(u, h)| (u.clone(), h.clone())).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RelayAuthorizer for MockRelay {
    fn id(&self) -> &'static str {
        "mock-relay"
    }

    async fn authorize(&self, domain: &str, credentials: &[RelayCredential]) -> ProviderResult<bool> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let mut list = self.accept_list.write().await;
        let entries = list.entry(domain.to_string()).or_default();
        for c in credentials {
            entries.insert(c.username.clone(), c.credential_hash.clone());
        }
        self.authorized_domains
            .write()
            .await
            .insert(domain.to_string());
        Ok(true)
    }

    async fn deauthorize(&self, domain: &str, username: &str) -> ProviderResult<bool> {
        self.take_failure()?;
        if let Some(entries) = self.accept_list.write().await.get_mut(domain) {
            entries.remove(username);
        }
        Ok(true)
    }

    async fn revoke_domain(&self, domain: &str) -> ProviderResult<bool> {
        self.take_failure()?;
        self.accept_list.write().await.remove(domain);
        self.authorized_domains.write().await.remove(domain);
        Ok(true)
    }

    async fn reload_config(&self) -> ProviderResult<bool> {
        self.reload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn status(&self, domain: &str) -> ProviderResult<RelayStatus> {
        Ok(RelayStatus {
            domain: domain.to_string(),
            authorized: self.is_authorized(domain).await,
            usernames: self
                .entries(domain)
                .await
                .into_iter()
                .map(|(u, _)| u)
                .collect(),
        })
    }
}

// ===== Resolver =====

/// How the simulated public DNS behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverMode {
    /// Answer with whatever the mock provider holds
    Live,
    /// Never show any TXT data
    Hidden,
    NxDomain,
}

/// Public DNS backed by the mock provider's records.
pub struct PublisherBackedResolver {
    publisher: Arc<MockPublisher>,
    mode: std::sync::RwLock<ResolverMode>,
    lookups: AtomicU32,
}

impl PublisherBackedResolver {
    pub fn new(publisher: Arc<MockPublisher>) -> Self {
        Self {
            publisher,
            mode: std::sync::RwLock::new(ResolverMode::Live),
            lookups: AtomicU32::new(0),
        }
    }

    pub fn set_mode(&self, mode: ResolverMode) {
        if let Ok(mut m) = self.mode.write() {
            *m = mode;
        }
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TxtResolver for PublisherBackedResolver {
    async fn lookup_txt(&self, name: &str) -> ToolboxResult<TxtLookup> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.read().map(|m| *m).unwrap_or(ResolverMode::Live);
        match mode {
            ResolverMode::NxDomain => Ok(TxtLookup::NxDomain),
            ResolverMode::Hidden => Ok(TxtLookup::NoRecords),
            ResolverMode::Live => {
                let values: Vec<String> = self
                    .publisher
                    .records_named(name)
                    .await
                    .into_iter()
                    .filter(|r| r.record_type == DnsRecordType::Txt)
                    .map(|r| r.content)
                    .collect();
                if values.is_empty() {
                    Ok(TxtLookup::NoRecords)
                } else {
                    Ok(TxtLookup::Records(values))
                }
            }
        }
    }
}

// ===== Key generators =====

/// Always fails, like an exhausted entropy source.
pub struct FailingKeyGenerator;

impl KeyMaterialGenerator for FailingKeyGenerator {
    fn generate(&self, _key_size: u32) -> CoreResult<GeneratedKeyPair> {
        Err(CoreError::KeyGeneration("entropy source unavailable".into()))
    }
}

// ===== Pipeline harness =====

pub struct TestPipeline {
    pub coordinator: Arc<DomainLifecycleCoordinator>,
    pub domains: Arc<MockDomainRepository>,
    pub keys: Arc<MockDkimKeyRepository>,
    pub inboxes: Arc<MockInboxRepository>,
    pub publisher: Arc<MockPublisher>,
    pub relay: Arc<MockRelay>,
    pub resolver: Arc<PublisherBackedResolver>,
    pub shutdown: CancellationToken,
}

pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        account_id: "cf-account".into(),
        server_ip: SERVER_IP,
        mail_host: MAIL_HOST.into(),
        dmarc_report_email: REPORT_EMAIL.into(),
        dkim_key_size: 1024,
        key_encryption_key: "test-master-key".into(),
        key_encryption_iterations: 1_000,
        relay_retry_delay: Duration::from_millis(100),
        ..PipelineSettings::default()
    }
}

pub fn pipeline() -> TestPipeline {
    pipeline_with(test_settings(), Arc::new(RsaKeyGenerator::new()))
}

pub fn pipeline_with(
    settings: PipelineSettings,
    key_generator: Arc<dyn KeyMaterialGenerator>,
) -> TestPipeline {
    let domains = Arc::new(MockDomainRepository::new());
    let keys = Arc::new(MockDkimKeyRepository::new());
    let inboxes = Arc::new(MockInboxRepository::new());
    let publisher = Arc::new(MockPublisher::new());
    let relay = Arc::new(MockRelay::new());
    let resolver = Arc::new(PublisherBackedResolver::new(publisher.clone()));
    let shutdown = CancellationToken::new();

    let ctx = PipelineContext::new(
        domains.clone(),
        keys.clone(),
        inboxes.clone(),
        publisher.clone(),
        relay.clone(),
        PropagationVerifier::new(resolver.clone()),
        key_generator,
        settings,
        shutdown.clone(),
    );

    TestPipeline {
        coordinator: Arc::new(DomainLifecycleCoordinator::new(Arc::new(ctx))),
        domains,
        keys,
        inboxes,
        publisher,
        relay,
        resolver,
        shutdown,
    }
}

pub fn registration(domain: &str) -> RegistrationRecord {
    let now = Utc::now();
    RegistrationRecord {
        domain: domain.to_string(),
        registrar: "namecheap".into(),
        registration_id: "reg-42".into(),
        price_cents: 1_299,
        purchased_at: now,
        expires_at: now + chrono::Duration::days(365),
        auto_renew: true,
    }
}
