//! Read models returned to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domain_activator_provider::RecordPurpose;

use super::DomainStatus;

/// Health summary of one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainHealth {
    pub domain_id: String,
    pub domain: String,
    pub status: DomainStatus,
    pub dns_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_verified_at: Option<DateTime<Utc>>,
    pub relay_authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_authorized_at: Option<DateTime<Utc>>,
    pub inbox_count: usize,
    /// Stable reason code of the last failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A record that could not be published in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    pub purpose: RecordPurpose,
    pub reason_code: String,
    /// Upstream message, for operators only
    pub message: String,
}

/// Outcome of one publishing fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    /// Purposes created in this run
    pub published: Vec<RecordPurpose>,
    /// Purposes already recorded by an earlier run
    pub skipped: Vec<RecordPurpose>,
    pub failed: Vec<RecordFailure>,
    /// Set when at least one failure was `RetriesExhausted`
    pub exhausted: bool,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of provider writes this run performed.
    pub fn writes(&self) -> usize {
        self.published.len()
    }
}
