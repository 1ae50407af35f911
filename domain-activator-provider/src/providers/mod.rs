//! Upstream client implementations

/// Shared helpers used by the clients.
pub mod common;

#[cfg(feature = "cloudflare")]
mod cloudflare;
#[cfg(feature = "kumo")]
mod kumo;

#[cfg(feature = "cloudflare")]
pub use cloudflare::{CloudflarePublisher, CloudflarePublisherBuilder};
#[cfg(feature = "kumo")]
pub use kumo::{KumoRelayClient, KumoRelayClientBuilder};
