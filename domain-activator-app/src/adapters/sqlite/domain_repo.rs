//! `DomainRepository` implementation for `SqliteStore`.

use async_trait::async_trait;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use domain_activator_core::error::{CoreError, CoreResult};
use domain_activator_core::traits::DomainRepository;
use domain_activator_core::types::{DmarcPolicy, Domain, DomainStatus, FailureReason};

use super::entity::domain;
use super::{parse_opt_time, parse_time, storage_error, SqliteStore};

impl domain::Model {
    /// Convert a `SeaORM` row model into a `Domain`.
    ///
    /// String-backed fields are parsed into strongly typed values.
    fn into_domain(self) -> CoreResult<Domain> {
        let status = self
            .status
            .parse::<DomainStatus>()
            .map_err(|e| CoreError::SerializationError(format!("Invalid status: {e}")))?;
        let dmarc_policy = self
            .dmarc_policy
            .parse::<DmarcPolicy>()
            .map_err(|e| CoreError::SerializationError(format!("Invalid dmarc_policy: {e}")))?;
        let failure_reason = self
            .failure_reason
            .map(|r| r.parse::<FailureReason>())
            .transpose()
            .map_err(|e| CoreError::SerializationError(format!("Invalid failure_reason: {e}")))?;
        let name_servers = serde_json::from_str(&self.name_servers)
            .map_err(|e| CoreError::SerializationError(format!("Invalid name_servers JSON: {e}")))?;
        let dns_records = serde_json::from_str(&self.dns_records)
            .map_err(|e| CoreError::SerializationError(format!("Invalid dns_records JSON: {e}")))?;
        let publish_attempts = u32::try_from(self.publish_attempts)
            .map_err(|e| CoreError::SerializationError(format!("Invalid publish_attempts: {e}")))?;

        Ok(Domain {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            status,
            zone_id: self.zone_id,
            name_servers,
            dns_records,
            dmarc_policy,
            dkim_selector: self.dkim_selector,
            dkim_key_id: self.dkim_key_id,
            dns_verified_at: parse_opt_time(self.dns_verified_at, "dns_verified_at")?,
            relay_authorized: self.relay_authorized != 0,
            relay_authorized_at: parse_opt_time(self.relay_authorized_at, "relay_authorized_at")?,
            registrar: self.registrar,
            registration_id: self.registration_id,
            purchase_price_cents: self.purchase_price_cents,
            purchased_at: parse_opt_time(self.purchased_at, "purchased_at")?,
            renewed_at: parse_opt_time(self.renewed_at, "renewed_at")?,
            expires_at: parse_opt_time(self.expires_at, "expires_at")?,
            auto_renew: self.auto_renew != 0,
            failure_reason,
            suspension_reason: self.suspension_reason,
            suspended_at: parse_opt_time(self.suspended_at, "suspended_at")?,
            publish_attempts,
            created_at: parse_time(&self.created_at, "created_at")?,
            updated_at: parse_time(&self.updated_at, "updated_at")?,
        })
    }
}

/// Convert a `Domain` into a `SeaORM` active model for upsert.
fn domain_to_active_model(d: &Domain) -> CoreResult<domain::ActiveModel> {
    let name_servers = serde_json::to_string(&d.name_servers)
        .map_err(|e| CoreError::SerializationError(e.to_string()))?;
    let dns_records = serde_json::to_string(&d.dns_records)
        .map_err(|e| CoreError::SerializationError(e.to_string()))?;

    Ok(domain::ActiveModel {
        id: Set(d.id.clone()),
        tenant_id: Set(d.tenant_id.clone()),
        name: Set(d.name.clone()),
        status: Set(d.status.as_str().to_string()),
        zone_id: Set(d.zone_id.clone()),
        name_servers: Set(name_servers),
        dns_records: Set(dns_records),
        dmarc_policy: Set(d.dmarc_policy.as_str().to_string()),
        dkim_selector: Set(d.dkim_selector.clone()),
        dkim_key_id: Set(d.dkim_key_id.clone()),
        dns_verified_at: Set(d.dns_verified_at.map(|t| t.to_rfc3339())),
        relay_authorized: Set(i32::from(d.relay_authorized)),
        relay_authorized_at: Set(d.relay_authorized_at.map(|t| t.to_rfc3339())),
        registrar: Set(d.registrar.clone()),
        registration_id: Set(d.registration_id.clone()),
        purchase_price_cents: Set(d.purchase_price_cents),
        purchased_at: Set(d.purchased_at.map(|t| t.to_rfc3339())),
        renewed_at: Set(d.renewed_at.map(|t| t.to_rfc3339())),
        expires_at: Set(d.expires_at.map(|t| t.to_rfc3339())),
        auto_renew: Set(i32::from(d.auto_renew)),
        failure_reason: Set(d.failure_reason.map(|r| r.as_str().to_string())),
        suspension_reason: Set(d.suspension_reason.clone()),
        suspended_at: Set(d.suspended_at.map(|t| t.to_rfc3339())),
        publish_attempts: Set(i64::from(d.publish_attempts)),
        created_at: Set(d.created_at.to_rfc3339()),
        updated_at: Set(d.updated_at.to_rfc3339()),
    })
}

#[async_trait]
impl DomainRepository for SqliteStore {
    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Domain>> {
        let row = domain::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(storage_error("query domain"))?;

        row.map(domain::Model::into_domain).transpose()
    }

    async fn find_by_name(&self, tenant_id: &str, name: &str) -> CoreResult<Option<Domain>> {
        let row = domain::Entity::find()
            .filter(domain::Column::TenantId.eq(tenant_id))
            .filter(domain::Column::Name.eq(name))
            .one(&self.db)
            .await
            .map_err(storage_error("query domain"))?;

        row.map(domain::Model::into_domain).transpose()
    }

    async fn find_by_tenant(&self, tenant_id: &str) -> CoreResult<Vec<Domain>> {
        let rows = domain::Entity::find()
            .filter(domain::Column::TenantId.eq(tenant_id))
            .order_by_asc(domain::Column::Name)
            .all(&self.db)
            .await
            .map_err(storage_error("query domains"))?;

        rows.into_iter().map(domain::Model::into_domain).collect()
    }

    async fn save(&self, d: &Domain) -> CoreResult<()> {
        let active_model = domain_to_active_model(d)?;

        domain::Entity::insert(active_model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(domain::Column::Id)
                    .update_columns([
                        domain::Column::Status,
                        domain::Column::ZoneId,
                        domain::Column::NameServers,
                        domain::Column::DnsRecords,
                        domain::Column::DmarcPolicy,
                        domain::Column::DkimSelector,
                        domain::Column::DkimKeyId,
                        domain::Column::DnsVerifiedAt,
                        domain::Column::RelayAuthorized,
                        domain::Column::RelayAuthorizedAt,
                        domain::Column::Registrar,
                        domain::Column::RegistrationId,
                        domain::Column::PurchasePriceCents,
                        domain::Column::PurchasedAt,
                        domain::Column::RenewedAt,
                        domain::Column::ExpiresAt,
                        domain::Column::AutoRenew,
                        domain::Column::FailureReason,
                        domain::Column::SuspensionReason,
                        domain::Column::SuspendedAt,
                        domain::Column::PublishAttempts,
                        domain::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(storage_error("save domain"))?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> CoreResult<()> {
        let result = domain::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(storage_error("delete domain"))?;

        if result.rows_affected == 0 {
            return Err(CoreError::DomainNotFound(id.to_string()));
        }
        Ok(())
    }
}
