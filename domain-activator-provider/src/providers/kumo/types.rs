//! KumoMTA admin API wire types

use serde::{Deserialize, Serialize};

/// `POST /api/admin/relay/{domain}/credentials` body
#[derive(Debug, Serialize)]
pub struct AddCredentialsBody<'a> {
    pub credentials: Vec<CredentialEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct CredentialEntry<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
}

/// `GET /api/admin/relay/{domain}` response
#[derive(Debug, Deserialize)]
pub struct RelayDomainResponse {
    pub domain: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub inboxes: Vec<String>,
}

/// Error body returned by the admin endpoint
#[derive(Debug, Default, Deserialize)]
pub struct KumoErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}
