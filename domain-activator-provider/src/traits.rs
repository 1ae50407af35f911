use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::{ProviderError, Result};
use crate::types::{
    DmarcPolicy, DnsRecordType, PublishedRecord, RecordSpec, RelayCredential, RelayStatus,
    ZoneInfo,
};

/// Raw upstream error (internal).
#[derive(Debug, Clone)]
pub(crate) struct RawApiError {
    /// HTTP status of the response, when known.
    pub status: Option<u16>,
    /// Upstream error code (format differs per upstream).
    pub code: Option<String>,
    /// Upstream error message.
    pub message: String,
}

impl RawApiError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(
        status: Option<u16>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// Extra information for error mapping (internal).
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorContext {
    /// Record name (for `RecordExists`).
    pub record_name: Option<String>,
    /// Record ID (for `RecordNotFound`).
    pub record_id: Option<String>,
    /// Domain or zone (for `DomainNotFound`).
    pub domain: Option<String>,
}

impl ErrorContext {
    pub fn record(name: &str) -> Self {
        Self {
            record_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn record_id(id: &str) -> Self {
        Self {
            record_id: Some(id.to_string()),
            ..Self::default()
        }
    }

    pub fn domain(domain: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            ..Self::default()
        }
    }
}

/// Maps an upstream's raw error payload onto [`ProviderError`] (internal).
pub(crate) trait ProviderErrorMapper {
    /// Upstream identifier.
    fn provider_name(&self) -> &'static str;

    /// Map a raw upstream error.
    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError;

    /// Shortcut: parse error.
    fn parse_error(&self, detail: impl ToString) -> ProviderError {
        ProviderError::ParseError {
            provider: self.provider_name().to_string(),
            detail: detail.to_string(),
        }
    }

    /// Fallback for codes without a dedicated variant.
    fn upstream_error(&self, raw: RawApiError) -> ProviderError {
        ProviderError::Upstream {
            provider: self.provider_name().to_string(),
            status: raw.status,
            raw_code: raw.code,
            raw_message: raw.message,
        }
    }
}

/// Zone and record management on a DNS provider.
///
/// Record creation is not locally deduplicated: the provider enforces natural-key
/// uniqueness and answers with [`ProviderError::RecordExists`] on conflicts. Callers that
/// need idempotency look the record up with [`find_records`](Self::find_records).
#[async_trait]
pub trait DnsRecordPublisher: Send + Sync {
    /// Upstream identifier.
    fn id(&self) -> &'static str;

    /// Register `domain` as a managed zone under `account_id`.
    async fn create_zone(&self, domain: &str, account_id: &str) -> Result<ZoneInfo>;

    /// Look a zone up by its name.
    async fn find_zone(&self, domain: &str) -> Result<Option<ZoneInfo>>;

    async fn delete_zone(&self, zone_id: &str) -> Result<()>;

    async fn create_record(&self, zone_id: &str, spec: &RecordSpec) -> Result<PublishedRecord>;

    /// Records in `zone_id` with exactly this name and type.
    async fn find_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: DnsRecordType,
    ) -> Result<Vec<PublishedRecord>>;

    /// Replace a record's content in place.
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> Result<PublishedRecord>;

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()>;

    /// TXT `v=spf1 ip4:<ip> -all` at the apex.
    async fn create_spf_record(
        &self,
        zone_id: &str,
        domain: &str,
        server_ip: Ipv4Addr,
    ) -> Result<PublishedRecord> {
        self.create_record(zone_id, &RecordSpec::spf(domain, server_ip))
            .await
    }

    /// TXT at `<selector>._domainkey.<domain>`.
    async fn create_dkim_record(
        &self,
        zone_id: &str,
        domain: &str,
        selector: &str,
        public_record_value: &str,
    ) -> Result<PublishedRecord> {
        self.create_record(
            zone_id,
            &RecordSpec::dkim(domain, selector, public_record_value),
        )
        .await
    }

    /// TXT at `_dmarc.<domain>`.
    async fn create_dmarc_record(
        &self,
        zone_id: &str,
        domain: &str,
        policy: DmarcPolicy,
        report_email: &str,
    ) -> Result<PublishedRecord> {
        self.create_record(zone_id, &RecordSpec::dmarc(domain, policy, report_email))
            .await
    }

    async fn create_mx_record(
        &self,
        zone_id: &str,
        domain: &str,
        mail_server_host: &str,
        priority: u16,
    ) -> Result<PublishedRecord> {
        self.create_record(zone_id, &RecordSpec::mx(domain, mail_server_host, priority))
            .await
    }

    async fn create_a_record(
        &self,
        zone_id: &str,
        domain: &str,
        ip: Ipv4Addr,
    ) -> Result<PublishedRecord> {
        self.create_record(zone_id, &RecordSpec::a(domain, ip)).await
    }
}

/// Live accept list of a mail relay.
///
/// Every mutation takes effect without restarting the relay. Adds and removes are
/// idempotent: re-adding an existing pair or removing a missing one succeeds.
#[async_trait]
pub trait RelayAuthorizer: Send + Sync {
    /// Upstream identifier.
    fn id(&self) -> &'static str;

    /// Admit `domain` together with `credentials` (may be empty).
    async fn authorize(&self, domain: &str, credentials: &[RelayCredential]) -> Result<bool>;

    /// Remove a single inbox from `domain`.
    async fn deauthorize(&self, domain: &str, username: &str) -> Result<bool>;

    /// Drop `domain` from the accept list entirely.
    async fn revoke_domain(&self, domain: &str) -> Result<bool>;

    /// Force a full configuration reload.
    async fn reload_config(&self) -> Result<bool>;

    async fn status(&self, domain: &str) -> Result<RelayStatus>;
}
