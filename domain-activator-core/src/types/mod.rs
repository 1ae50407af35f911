//! Type definition module

mod dkim;
mod domain;
mod inbox;
mod report;

pub use dkim::{DkimKey, DKIM_ALGORITHM};
pub use domain::{DnsRecordEntry, Domain, DomainStatus, FailureReason, RegistrationRecord};
pub use inbox::InboxCredential;
pub use report::{DomainHealth, PublishReport, RecordFailure};

// Re-export the provider crate's public record types
pub use domain_activator_provider::{
    DmarcPolicy, DnsRecordType, PublishedRecord, RecordPurpose, RecordSpec, RelayCredential,
    RelayStatus, ZoneInfo,
};
