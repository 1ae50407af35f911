//! Inbox credentials queued for relay authorization

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domain_activator_provider::RelayCredential;

/// One `(username, credential hash)` pair for a domain.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxCredential {
    pub domain_id: String,
    pub username: String,
    pub credential_hash: String,
    /// Pushed to the relay at least once
    #[serde(default)]
    pub authorized: bool,
    pub created_at: DateTime<Utc>,
}

impl InboxCredential {
    pub fn new(domain_id: &str, username: &str, credential_hash: &str) -> Self {
        Self {
            domain_id: domain_id.to_string(),
            username: username.to_string(),
            credential_hash: credential_hash.to_string(),
            authorized: false,
            created_at: Utc::now(),
        }
    }

    pub fn to_relay(&self) -> RelayCredential {
        RelayCredential::new(self.username.clone(), self.credential_hash.clone())
    }
}

impl fmt::Debug for InboxCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboxCredential")
            .field("domain_id", &self.domain_id)
            .field("username", &self.username)
            .field("credential_hash", &"<redacted>")
            .field("authorized", &self.authorized)
            .finish_non_exhaustive()
    }
}
