//! Domain persistence abstract Trait

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::Domain;

/// Domain repository Trait
///
/// Implemented by the application layer (`SqliteStore`) and by in-memory mocks in tests.
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// Get a domain by ID
    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Domain>>;

    /// Get a tenant's domain by name
    ///
    /// # Arguments
    /// * `tenant_id` - Tenant ID
    /// * `name` - normalized domain name
    async fn find_by_name(&self, tenant_id: &str, name: &str) -> CoreResult<Option<Domain>>;

    /// All domains of a tenant
    async fn find_by_tenant(&self, tenant_id: &str) -> CoreResult<Vec<Domain>>;

    /// Save domain (new or update)
    async fn save(&self, domain: &Domain) -> CoreResult<()>;

    /// Delete domain
    async fn delete(&self, id: &str) -> CoreResult<()>;
}
