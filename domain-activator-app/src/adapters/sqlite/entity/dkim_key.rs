use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "dkim_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub domain_id: String,
    pub selector: String,
    pub algorithm: String,
    pub key_size: i64,
    pub public_record_value: String,
    pub fingerprint: String,
    pub kdf_iterations: i64,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
    pub active: i32,
    pub created_at: String,
    pub rotated_at: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
