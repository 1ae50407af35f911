//! Inbox credential persistence abstract Trait

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::InboxCredential;

/// Queued inbox credentials, keyed by `(domain_id, username)`.
#[async_trait]
pub trait InboxCredentialRepository: Send + Sync {
    async fn find_by_domain(&self, domain_id: &str) -> CoreResult<Vec<InboxCredential>>;

    /// Insert, or replace the entry with the same username
    async fn save(&self, credential: &InboxCredential) -> CoreResult<()>;

    async fn delete(&self, domain_id: &str, username: &str) -> CoreResult<()>;

    async fn delete_by_domain(&self, domain_id: &str) -> CoreResult<()>;
}
