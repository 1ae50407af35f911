use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// TTL applied to every record the pipeline publishes.
pub const DEFAULT_RECORD_TTL: u32 = 3600;

/// Label under which DKIM selectors live.
pub const DKIM_NAMESPACE: &str = "_domainkey";

/// Label of the DMARC policy record.
pub const DMARC_LABEL: &str = "_dmarc";

// ============ DNS Record Types ============

/// Record types the pipeline publishes.
///
/// Serialized as uppercase strings (`"A"`, `"MX"`, `"TXT"`), matching the provider wire
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    /// IPv4 address record.
    A,
    /// Mail exchange record.
    Mx,
    /// Text record.
    Txt,
}

impl DnsRecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Mx => "MX",
            Self::Txt => "TXT",
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DnsRecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "MX" => Ok(Self::Mx),
            "TXT" => Ok(Self::Txt),
            other => Err(format!("unsupported record type: {other}")),
        }
    }
}

/// Why a record exists. Together with the record name this is the natural key the
/// pipeline uses to recognise records it already published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPurpose {
    Spf,
    Dkim,
    Dmarc,
    Mx,
    A,
}

impl fmt::Display for RecordPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Spf => "spf",
            Self::Dkim => "dkim",
            Self::Dmarc => "dmarc",
            Self::Mx => "mx",
            Self::A => "a",
        })
    }
}

/// DMARC enforcement policy (`p=` tag).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmarcPolicy {
    /// Monitor only. Every new domain starts here.
    #[default]
    None,
    Quarantine,
    Reject,
}

impl DmarcPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Quarantine => "quarantine",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for DmarcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DmarcPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "quarantine" => Ok(Self::Quarantine),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown DMARC policy: {other}")),
        }
    }
}

// ============ Record construction ============

/// A record to publish, fully rendered (absolute name, final content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSpec {
    pub purpose: RecordPurpose,
    pub record_type: DnsRecordType,
    /// Fully qualified name, without trailing dot.
    pub name: String,
    pub content: String,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    /// Cloudflare proxy flag; only meaningful for A records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}

impl RecordSpec {
    fn txt(purpose: RecordPurpose, name: String, content: String) -> Self {
        Self {
            purpose,
            record_type: DnsRecordType::Txt,
            name,
            content,
            ttl: DEFAULT_RECORD_TTL,
            priority: None,
            proxied: None,
        }
    }

    /// `v=spf1 ip4:<ip> -all` at the apex.
    pub fn spf(domain: &str, server_ip: Ipv4Addr) -> Self {
        Self::txt(RecordPurpose::Spf, domain.to_string(), spf_value(server_ip))
    }

    /// DKIM public key at `<selector>._domainkey.<domain>`.
    pub fn dkim(domain: &str, selector: &str, public_record_value: &str) -> Self {
        Self::txt(
            RecordPurpose::Dkim,
            dkim_record_name(domain, selector),
            public_record_value.to_string(),
        )
    }

    /// DMARC policy at `_dmarc.<domain>`.
    pub fn dmarc(domain: &str, policy: DmarcPolicy, report_email: &str) -> Self {
        Self::txt(
            RecordPurpose::Dmarc,
            dmarc_record_name(domain),
            dmarc_value(policy, report_email),
        )
    }

    pub fn mx(domain: &str, mail_server_host: &str, priority: u16) -> Self {
        Self {
            purpose: RecordPurpose::Mx,
            record_type: DnsRecordType::Mx,
            name: domain.to_string(),
            content: mail_server_host.trim_end_matches('.').to_string(),
            ttl: DEFAULT_RECORD_TTL,
            priority: Some(priority),
            proxied: None,
        }
    }

    pub fn a(domain: &str, ip: Ipv4Addr) -> Self {
        Self {
            purpose: RecordPurpose::A,
            record_type: DnsRecordType::A,
            name: domain.to_string(),
            content: ip.to_string(),
            ttl: DEFAULT_RECORD_TTL,
            priority: None,
            proxied: Some(false),
        }
    }
}

pub fn spf_value(server_ip: Ipv4Addr) -> String {
    format!("v=spf1 ip4:{server_ip} -all")
}

pub fn dmarc_value(policy: DmarcPolicy, report_email: &str) -> String {
    format!("v=DMARC1; p={policy}; rua=mailto:{report_email}")
}

pub fn dkim_record_name(domain: &str, selector: &str) -> String {
    format!("{selector}.{DKIM_NAMESPACE}.{domain}")
}

pub fn dmarc_record_name(domain: &str) -> String {
    format!("{DMARC_LABEL}.{domain}")
}

// ============ Provider results ============

/// A record as it exists at the DNS provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedRecord {
    /// Provider-assigned record identifier.
    pub id: String,
    pub zone_id: String,
    pub record_type: DnsRecordType,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
}

/// A zone as returned by the DNS provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneInfo {
    pub id: String,
    pub name: String,
    /// Name servers the registrar must delegate to.
    #[serde(default)]
    pub name_servers: Vec<String>,
    pub status: String,
}

// ============ Relay ============

/// A (username, credential hash) pair admitted by the relay.
///
/// The hash is never printed; `Debug` redacts it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayCredential {
    pub username: String,
    pub credential_hash: String,
}

impl RelayCredential {
    pub fn new(username: impl Into<String>, credential_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential_hash: credential_hash.into(),
        }
    }
}

impl fmt::Debug for RelayCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayCredential")
            .field("username", &self.username)
            .field("credential_hash", &"<redacted>")
            .finish()
    }
}

/// Relay-side view of a domain's accept-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub domain: String,
    pub authorized: bool,
    #[serde(default)]
    pub usernames: Vec<String>,
}
