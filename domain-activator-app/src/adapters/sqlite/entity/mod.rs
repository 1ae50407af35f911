//! `SeaORM` entities for `SqliteStore`.

pub mod dkim_key;
pub mod domain;
pub mod inbox_credential;
