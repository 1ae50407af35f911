//! Resolver construction shared by the lookup services.

use std::net::IpAddr;

use hickory_resolver::{
    TokioResolver,
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
};

/// Deduplicate nameserver IP addresses from a resolver configuration.
pub(crate) fn dedup_ips(config: &ResolverConfig) -> Vec<String> {
    let mut ips: Vec<String> = Vec::new();
    for ns in config.name_servers() {
        let ip = ns.socket_addr.ip().to_string();
        if !ips.contains(&ip) {
            ips.push(ip);
        }
    }
    ips
}

/// Build a resolver that queries `nameservers` directly, or the system configuration
/// when the list is empty.
///
/// Answers are not cached: a propagation poll must observe the upstream state on every
/// attempt rather than a negative answer cached from the previous one.
pub(crate) fn build_resolver(nameservers: &[IpAddr]) -> TokioResolver {
    if nameservers.is_empty() {
        return build_system_resolver();
    }

    let config = ResolverConfig::from_parts(
        None,
        vec![],
        NameServerConfigGroup::from_ips_clear(nameservers, 53, true),
    );
    log::debug!(
        "[propagation] Using explicit nameservers: {}",
        dedup_ips(&config).join(", ")
    );
    TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
        .with_options(uncached_opts())
        .build()
}

/// Build a resolver using the host system DNS configuration (with fallback).
fn build_system_resolver() -> TokioResolver {
    #[cfg(any(unix, target_os = "windows"))]
    {
        match TokioResolver::builder_tokio() {
            Ok(mut builder) => {
                *builder.options_mut() = uncached_opts();
                return builder.build();
            }
            Err(e) => {
                log::warn!(
                    "[propagation] Failed to load system DNS configuration, falling back to defaults: {e}"
                );
            }
        }
    }

    TokioResolver::builder_with_config(ResolverConfig::default(), TokioConnectionProvider::default())
        .with_options(uncached_opts())
        .build()
}

fn uncached_opts() -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.cache_size = 0;
    opts
}
