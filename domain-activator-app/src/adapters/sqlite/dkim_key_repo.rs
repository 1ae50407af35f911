//! `DkimKeyRepository` implementation for `SqliteStore`.

use async_trait::async_trait;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use domain_activator_core::crypto::EncryptedBlob;
use domain_activator_core::error::{CoreError, CoreResult};
use domain_activator_core::traits::DkimKeyRepository;
use domain_activator_core::types::DkimKey;

use super::entity::dkim_key;
use super::{parse_opt_time, parse_time, storage_error, SqliteStore};

impl dkim_key::Model {
    fn into_key(self) -> CoreResult<DkimKey> {
        let key_size = u32::try_from(self.key_size)
            .map_err(|e| CoreError::SerializationError(format!("Invalid key_size: {e}")))?;
        let iterations = u32::try_from(self.kdf_iterations)
            .map_err(|e| CoreError::SerializationError(format!("Invalid kdf_iterations: {e}")))?;

        Ok(DkimKey {
            id: self.id,
            domain_id: self.domain_id,
            selector: self.selector,
            algorithm: self.algorithm,
            key_size,
            public_record_value: self.public_record_value,
            fingerprint: self.fingerprint,
            private_key: EncryptedBlob {
                iterations,
                salt: self.salt,
                nonce: self.nonce,
                ciphertext: self.ciphertext,
            },
            active: self.active != 0,
            created_at: parse_time(&self.created_at, "created_at")?,
            rotated_at: parse_opt_time(self.rotated_at, "rotated_at")?,
            expires_at: parse_opt_time(self.expires_at, "expires_at")?,
        })
    }
}

fn key_to_active_model(key: &DkimKey) -> dkim_key::ActiveModel {
    dkim_key::ActiveModel {
        id: Set(key.id.clone()),
        domain_id: Set(key.domain_id.clone()),
        selector: Set(key.selector.clone()),
        algorithm: Set(key.algorithm.clone()),
        key_size: Set(i64::from(key.key_size)),
        public_record_value: Set(key.public_record_value.clone()),
        fingerprint: Set(key.fingerprint.clone()),
        kdf_iterations: Set(i64::from(key.private_key.iterations)),
        salt: Set(key.private_key.salt.clone()),
        nonce: Set(key.private_key.nonce.clone()),
        ciphertext: Set(key.private_key.ciphertext.clone()),
        active: Set(i32::from(key.active)),
        created_at: Set(key.created_at.to_rfc3339()),
        rotated_at: Set(key.rotated_at.map(|t| t.to_rfc3339())),
        expires_at: Set(key.expires_at.map(|t| t.to_rfc3339())),
    }
}

#[async_trait]
impl DkimKeyRepository for SqliteStore {
    async fn find_active(&self, domain_id: &str, selector: &str) -> CoreResult<Option<DkimKey>> {
        let row = dkim_key::Entity::find()
            .filter(dkim_key::Column::DomainId.eq(domain_id))
            .filter(dkim_key::Column::Selector.eq(selector))
            .filter(dkim_key::Column::Active.eq(1))
            .order_by_desc(dkim_key::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(storage_error("query DKIM key"))?;

        row.map(dkim_key::Model::into_key).transpose()
    }

    async fn find_by_domain(&self, domain_id: &str) -> CoreResult<Vec<DkimKey>> {
        let rows = dkim_key::Entity::find()
            .filter(dkim_key::Column::DomainId.eq(domain_id))
            .order_by_asc(dkim_key::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(storage_error("query DKIM keys"))?;

        rows.into_iter().map(dkim_key::Model::into_key).collect()
    }

    async fn save(&self, key: &DkimKey) -> CoreResult<()> {
        dkim_key::Entity::insert(key_to_active_model(key))
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(dkim_key::Column::Id)
                    .update_columns([
                        dkim_key::Column::Active,
                        dkim_key::Column::RotatedAt,
                        dkim_key::Column::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(storage_error("save DKIM key"))?;

        Ok(())
    }

    async fn delete_by_domain(&self, domain_id: &str) -> CoreResult<()> {
        let result = dkim_key::Entity::delete_many()
            .filter(dkim_key::Column::DomainId.eq(domain_id))
            .exec(&self.db)
            .await
            .map_err(storage_error("delete DKIM keys"))?;

        log::debug!(
            "[sqlite] removed {} DKIM key(s) of {domain_id}",
            result.rows_affected
        );
        Ok(())
    }
}
