//! DKIM key persistence abstract Trait

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::DkimKey;

/// DKIM key repository Trait
///
/// At most one key per `(domain_id, selector)` is active. Saving an active key does not
/// deactivate others; the caller retires the previous key first.
#[async_trait]
pub trait DkimKeyRepository: Send + Sync {
    /// Active key for a selector
    async fn find_active(&self, domain_id: &str, selector: &str) -> CoreResult<Option<DkimKey>>;

    /// Every key of a domain, active or rotated, oldest first
    async fn find_by_domain(&self, domain_id: &str) -> CoreResult<Vec<DkimKey>>;

    /// Save key (new or update)
    async fn save(&self, key: &DkimKey) -> CoreResult<()>;

    /// Remove every key of a domain
    async fn delete_by_domain(&self, domain_id: &str) -> CoreResult<()>;
}
