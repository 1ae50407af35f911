//! `InboxCredentialRepository` implementation for `SqliteStore`.

use async_trait::async_trait;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use domain_activator_core::error::CoreResult;
use domain_activator_core::traits::InboxCredentialRepository;
use domain_activator_core::types::InboxCredential;

use super::entity::inbox_credential;
use super::{parse_time, storage_error, SqliteStore};

impl inbox_credential::Model {
    fn into_credential(self) -> CoreResult<InboxCredential> {
        Ok(InboxCredential {
            created_at: parse_time(&self.created_at, "created_at")?,
            domain_id: self.domain_id,
            username: self.username,
            credential_hash: self.credential_hash,
            authorized: self.authorized != 0,
        })
    }
}

#[async_trait]
impl InboxCredentialRepository for SqliteStore {
    async fn find_by_domain(&self, domain_id: &str) -> CoreResult<Vec<InboxCredential>> {
        let rows = inbox_credential::Entity::find()
            .filter(inbox_credential::Column::DomainId.eq(domain_id))
            .order_by_asc(inbox_credential::Column::Username)
            .all(&self.db)
            .await
            .map_err(storage_error("query inbox credentials"))?;

        rows.into_iter()
            .map(inbox_credential::Model::into_credential)
            .collect()
    }

    async fn save(&self, credential: &InboxCredential) -> CoreResult<()> {
        let active_model = inbox_credential::ActiveModel {
            domain_id: Set(credential.domain_id.clone()),
            username: Set(credential.username.clone()),
            credential_hash: Set(credential.credential_hash.clone()),
            authorized: Set(i32::from(credential.authorized)),
            created_at: Set(credential.created_at.to_rfc3339()),
        };

        // re-queuing a username replaces its hash and requires a fresh push
        inbox_credential::Entity::insert(active_model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::columns([
                    inbox_credential::Column::DomainId,
                    inbox_credential::Column::Username,
                ])
                .update_columns([
                    inbox_credential::Column::CredentialHash,
                    inbox_credential::Column::Authorized,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(storage_error("save inbox credential"))?;

        Ok(())
    }

    async fn delete(&self, domain_id: &str, username: &str) -> CoreResult<()> {
        inbox_credential::Entity::delete_by_id((domain_id.to_string(), username.to_string()))
            .exec(&self.db)
            .await
            .map_err(storage_error("delete inbox credential"))?;
        Ok(())
    }

    async fn delete_by_domain(&self, domain_id: &str) -> CoreResult<()> {
        inbox_credential::Entity::delete_many()
            .filter(inbox_credential::Column::DomainId.eq(domain_id))
            .exec(&self.db)
            .await
            .map_err(storage_error("delete inbox credentials"))?;
        Ok(())
    }
}
