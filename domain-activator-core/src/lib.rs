//! Domain Activator Core Library
//!
//! Business logic of the domain activation pipeline:
//! - Domain lifecycle state machine ([`DomainLifecycleCoordinator`])
//! - DKIM key generation and sealing at rest ([`crypto`])
//! - Record publishing fan-out, propagation waits, relay authorization
//!
//! Storage is abstracted through traits; upstreams come from `domain-activator-provider`
//! and `domain-activator-toolbox`. The application layer wires concrete implementations
//! into a [`PipelineContext`].

pub mod crypto;
pub mod error;
pub mod services;
pub mod traits;
pub mod types;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use error::{CoreError, CoreResult};
pub use services::{DomainLifecycleCoordinator, PipelineContext, PipelineSettings};
pub use traits::{DkimKeyRepository, DomainRepository, InboxCredentialRepository};
