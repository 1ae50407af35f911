//! Storage layer abstraction trait definition

mod dkim_key_repository;
mod domain_repository;
mod inbox_credential_repository;

pub use dkim_key_repository::DkimKeyRepository;
pub use domain_repository::DomainRepository;
pub use inbox_credential_repository::InboxCredentialRepository;
