//! Propagation verification: poll public DNS until a published record is visible.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use tokio::time::{Duration, Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{PropagationOutcome, TxtLookup};

use super::resolver::build_resolver;

/// TXT lookups against public DNS.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// Query the TXT records at `name`.
    ///
    /// NXDOMAIN and "no records" are answers, not errors. `Err` is reserved for
    /// resolver failures (timeouts, SERVFAIL, unreachable upstream).
    async fn lookup_txt(&self, name: &str) -> ToolboxResult<TxtLookup>;
}

/// [`TxtResolver`] backed by hickory.
pub struct HickoryTxtResolver {
    resolver: TokioResolver,
}

impl HickoryTxtResolver {
    /// Resolver using the host's DNS configuration.
    pub fn system() -> Self {
        Self {
            resolver: build_resolver(&[]),
        }
    }

    /// Resolver querying the given nameservers directly.
    pub fn with_nameservers(nameservers: &[IpAddr]) -> Self {
        Self {
            resolver: build_resolver(nameservers),
        }
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn lookup_txt(&self, name: &str) -> ToolboxResult<TxtLookup> {
        match self.resolver.txt_lookup(name).await {
            Ok(response) => {
                let values: Vec<String> = response
                    .iter()
                    .map(|txt| {
                        // long values are split into 255-byte character-strings
                        txt.iter()
                            .map(|data| String::from_utf8_lossy(data).into_owned())
                            .collect::<String>()
                    })
                    .collect();
                if values.is_empty() {
                    Ok(TxtLookup::NoRecords)
                } else {
                    Ok(TxtLookup::Records(values))
                }
            }
            // NXDOMAIN is also reported as "no records found", so test it first
            Err(e) if e.is_nx_domain() => Ok(TxtLookup::NxDomain),
            Err(e) if e.is_no_records_found() => Ok(TxtLookup::NoRecords),
            Err(e) => Err(ToolboxError::NetworkError(e.to_string())),
        }
    }
}

/// Polls TXT records until they match, the deadline passes, or the caller cancels.
#[derive(Clone)]
pub struct PropagationVerifier {
    resolver: Arc<dyn TxtResolver>,
}

impl PropagationVerifier {
    pub fn new(resolver: Arc<dyn TxtResolver>) -> Self {
        Self { resolver }
    }

    /// Verifier backed by the system resolver.
    pub fn system() -> Self {
        Self::new(Arc::new(HickoryTxtResolver::system()))
    }

    /// `true` once `v=spf1 ip4:<expected_ip>` is visible at the apex.
    pub async fn wait_for_spf(
        &self,
        domain: &str,
        expected_ip: Ipv4Addr,
        timeout: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> bool {
        self.await_spf(domain, expected_ip, timeout, interval, cancel)
            .await
            .is_visible()
    }

    /// `true` once a DKIM key record is visible under `selector`.
    pub async fn wait_for_dkim(
        &self,
        domain: &str,
        selector: &str,
        timeout: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> bool {
        self.await_dkim(domain, selector, timeout, interval, cancel)
            .await
            .is_visible()
    }

    /// Like [`wait_for_spf`](Self::wait_for_spf), reporting why the wait ended.
    pub async fn await_spf(
        &self,
        domain: &str,
        expected_ip: Ipv4Addr,
        timeout: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> PropagationOutcome {
        let expected = format!("v=spf1 ip4:{expected_ip}");
        self.poll(
            domain,
            |value| value.contains(&expected),
            timeout,
            interval,
            cancel,
        )
        .await
    }

    /// Like [`wait_for_dkim`](Self::wait_for_dkim), reporting why the wait ended.
    pub async fn await_dkim(
        &self,
        domain: &str,
        selector: &str,
        timeout: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> PropagationOutcome {
        let name = format!("{selector}._domainkey.{domain}");
        self.poll(
            &name,
            |value| value.contains("v=DKIM1") && value.contains("p="),
            timeout,
            interval,
            cancel,
        )
        .await
    }

    async fn poll<F>(
        &self,
        name: &str,
        matches: F,
        timeout: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> PropagationOutcome
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let lookup = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    log::info!("[propagation] {name}: wait cancelled after {attempts} lookups");
                    return PropagationOutcome::Cancelled;
                }
                result = self.resolver.lookup_txt(name) => result,
                () = sleep_until(deadline) => {
                    log::warn!("[propagation] {name}: not visible within {}s", timeout.as_secs());
                    return PropagationOutcome::TimedOut;
                }
            };

            match lookup {
                Ok(TxtLookup::Records(values)) if values.iter().any(|v| matches(v)) => {
                    log::info!(
                        "[propagation] {name}: visible after {:.1}s ({attempts} lookups)",
                        started.elapsed().as_secs_f32()
                    );
                    return PropagationOutcome::Visible;
                }
                Ok(TxtLookup::Records(values)) => {
                    log::debug!(
                        "[propagation] {name}: {} TXT answer(s), none match yet",
                        values.len()
                    );
                }
                Ok(TxtLookup::NoRecords) => {
                    log::debug!("[propagation] {name}: no TXT records yet");
                }
                Ok(TxtLookup::NxDomain) => {
                    log::warn!("[propagation] {name}: NXDOMAIN, giving up");
                    return PropagationOutcome::NxDomain;
                }
                Err(e) => {
                    log::warn!("[propagation] {name}: resolver error, will retry: {e}");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!("[propagation] {name}: not visible within {}s", timeout.as_secs());
                return PropagationOutcome::TimedOut;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    log::info!("[propagation] {name}: wait cancelled after {attempts} lookups");
                    return PropagationOutcome::Cancelled;
                }
                () = sleep(interval.min(deadline - now)) => {}
            }
        }
    }
}
