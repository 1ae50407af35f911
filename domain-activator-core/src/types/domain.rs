//! Domain lifecycle types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domain_activator_provider::{DmarcPolicy, DnsRecordType, PublishedRecord, RecordPurpose};

/// Lifecycle state of a sending domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    /// Purchase in flight at the registrar
    PendingPurchase,
    /// Registered; records not yet published or not yet visible
    PendingDns,
    /// Records published and observed on public DNS
    DnsVerified,
    /// Authorized in the relay; mail can flow
    Active,
    /// Abuse kill-switch engaged
    Suspended,
    /// Registration lapsed
    Expired,
    /// DNS publishing gave up
    Failed,
}

impl DomainStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingPurchase => "pending_purchase",
            Self::PendingDns => "pending_dns",
            Self::DnsVerified => "dns_verified",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use DomainStatus::{
            Active, DnsVerified, Expired, Failed, PendingDns, PendingPurchase, Suspended,
        };
        matches!(
            (self, next),
            (PendingPurchase, PendingDns)
                | (PendingDns, DnsVerified | Failed | Suspended)
                | (DnsVerified, Active | Suspended)
                | (Active, Suspended | Expired)
                | (Suspended, Active | PendingDns)
                | (Failed, PendingDns)
        )
    }

    /// States in which the activation pipeline may still make progress.
    pub fn is_activatable(self) -> bool {
        matches!(self, Self::PendingDns | Self::DnsVerified)
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_purchase" => Ok(Self::PendingPurchase),
            "pending_dns" => Ok(Self::PendingDns),
            "dns_verified" => Ok(Self::DnsVerified),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "expired" => Ok(Self::Expired),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown domain status: {other}")),
        }
    }
}

/// Stable reason code persisted on a domain after an unsuccessful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    KeyGenerationFailed,
    DnsPublishIncomplete,
    DnsPublishFailed,
    PropagationTimeout,
    Nxdomain,
    RelayAuthorizationFailed,
    RelayDeauthorizationFailed,
    UpstreamUnavailable,
    ProviderRejected,
    ProviderCredentialsRejected,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeyGenerationFailed => "key_generation_failed",
            Self::DnsPublishIncomplete => "dns_publish_incomplete",
            Self::DnsPublishFailed => "dns_publish_failed",
            Self::PropagationTimeout => "propagation_timeout",
            Self::Nxdomain => "nxdomain",
            Self::RelayAuthorizationFailed => "relay_authorization_failed",
            Self::RelayDeauthorizationFailed => "relay_deauthorization_failed",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::ProviderRejected => "provider_rejected",
            Self::ProviderCredentialsRejected => "provider_credentials_rejected",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::KeyGenerationFailed,
            Self::DnsPublishIncomplete,
            Self::DnsPublishFailed,
            Self::PropagationTimeout,
            Self::Nxdomain,
            Self::RelayAuthorizationFailed,
            Self::RelayDeauthorizationFailed,
            Self::UpstreamUnavailable,
            Self::ProviderRejected,
            Self::ProviderCredentialsRejected,
        ]
        .into_iter()
        .find(|r| r.as_str() == s)
        .ok_or_else(|| format!("unknown failure reason: {s}"))
    }
}

/// A record the pipeline created, as evidence for later runs and teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecordEntry {
    pub purpose: RecordPurpose,
    /// Provider-side record id
    pub record_id: String,
    pub record_type: DnsRecordType,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    pub created_at: DateTime<Utc>,
}

impl DnsRecordEntry {
    pub fn from_published(purpose: RecordPurpose, record: PublishedRecord) -> Self {
        Self {
            purpose,
            record_id: record.id,
            record_type: record.record_type,
            name: record.name,
            content: record.content,
            ttl: record.ttl,
            priority: record.priority,
            created_at: Utc::now(),
        }
    }
}

/// Registrar output handed over when a purchase completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    pub domain: String,
    pub registrar: String,
    pub registration_id: String,
    /// Purchase price in the smallest currency unit
    pub price_cents: i64,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_auto_renew")]
    pub auto_renew: bool,
}

fn default_auto_renew() -> bool {
    true
}

/// A tenant's sending domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Domain ID (UUID)
    pub id: String,
    pub tenant_id: String,
    /// Lowercase, no trailing dot
    pub name: String,
    pub status: DomainStatus,

    // DNS provider side
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub name_servers: Vec<String>,
    #[serde(default)]
    pub dns_records: Vec<DnsRecordEntry>,
    #[serde(default)]
    pub dmarc_policy: DmarcPolicy,
    pub dkim_selector: String,
    /// Id of the active key under `dkim_selector`
    #[serde(default)]
    pub dkim_key_id: Option<String>,
    #[serde(default)]
    pub dns_verified_at: Option<DateTime<Utc>>,

    // Relay side
    #[serde(default)]
    pub relay_authorized: bool,
    #[serde(default)]
    pub relay_authorized_at: Option<DateTime<Utc>>,

    // Registration
    #[serde(default)]
    pub registrar: Option<String>,
    #[serde(default)]
    pub registration_id: Option<String>,
    #[serde(default)]
    pub purchase_price_cents: Option<i64>,
    #[serde(default)]
    pub purchased_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub renewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_renew: bool,

    // Outcome bookkeeping
    #[serde(default)]
    pub failure_reason: Option<FailureReason>,
    #[serde(default)]
    pub suspension_reason: Option<String>,
    #[serde(default)]
    pub suspended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub publish_attempts: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    /// A fresh domain in `pending_purchase`.
    pub fn new(tenant_id: &str, name: &str, dkim_selector: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            status: DomainStatus::PendingPurchase,
            zone_id: None,
            name_servers: Vec::new(),
            dns_records: Vec::new(),
            dmarc_policy: DmarcPolicy::None,
            dkim_selector: dkim_selector.to_string(),
            dkim_key_id: None,
            dns_verified_at: None,
            relay_authorized: false,
            relay_authorized_at: None,
            registrar: None,
            registration_id: None,
            purchase_price_cents: None,
            purchased_at: None,
            renewed_at: None,
            expires_at: None,
            auto_renew: false,
            failure_reason: None,
            suspension_reason: None,
            suspended_at: None,
            publish_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The recorded entry for a purpose, if published by an earlier run.
    pub fn record(&self, purpose: RecordPurpose) -> Option<&DnsRecordEntry> {
        self.dns_records.iter().find(|r| r.purpose == purpose)
    }

    pub fn has_record(&self, purpose: RecordPurpose, name: &str) -> bool {
        self.dns_records
            .iter()
            .any(|r| r.purpose == purpose && r.name == name)
    }

    /// Replace the entry for `entry.purpose` and `entry.name`, or append it.
    pub fn upsert_record(&mut self, entry: DnsRecordEntry) {
        if let Some(existing) = self
            .dns_records
            .iter_mut()
            .find(|r| r.purpose == entry.purpose && r.name == entry.name)
        {
            *existing = entry;
        } else {
            self.dns_records.push(entry);
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
