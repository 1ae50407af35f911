//! `SeaORM` entity for the `domains` table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "domains")]
/// Database row model for a sending domain.
///
/// `name_servers` and `dns_records` hold JSON arrays; timestamps are RFC 3339.
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub status: String,
    pub zone_id: Option<String>,
    pub name_servers: String,
    pub dns_records: String,
    pub dmarc_policy: String,
    pub dkim_selector: String,
    pub dkim_key_id: Option<String>,
    pub dns_verified_at: Option<String>,
    pub relay_authorized: i32,
    pub relay_authorized_at: Option<String>,
    pub registrar: Option<String>,
    pub registration_id: Option<String>,
    pub purchase_price_cents: Option<i64>,
    pub purchased_at: Option<String>,
    pub renewed_at: Option<String>,
    pub expires_at: Option<String>,
    pub auto_renew: i32,
    pub failure_reason: Option<String>,
    pub suspension_reason: Option<String>,
    pub suspended_at: Option<String>,
    pub publish_attempts: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
