//! Domain lifecycle coordinator
//!
//! Drives a domain from registration to `active`:
//!
//! ```text
//! pending_purchase -> pending_dns -> dns_verified -> active
//!                      |    ^                |        |
//!                      v    |                v        v
//!                     failed            suspended   expired
//! ```
//!
//! Every step checks stored progress before doing work (zone recorded, key present,
//! records recorded, DNS verified), so a run can be repeated after a crash or a partial
//! failure. Status changes happen under a state lock that re-reads the stored domain,
//! which is how a concurrent suspension always wins over a run about to commit.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use domain_activator_provider::{
    DmarcPolicy, ProviderError, RecordPurpose, RecordSpec, RelayCredential,
};
use domain_activator_toolbox::{validate_domain, PropagationOutcome};

use crate::error::{CoreError, CoreResult};
use crate::services::dns_publishing::{adopt_existing, dmarc_spec, publish_missing};
use crate::services::in_flight::InFlightRuns;
use crate::services::{key_service, relay_service, PipelineContext};
use crate::types::{
    DkimKey, DnsRecordEntry, Domain, DomainHealth, DomainStatus, FailureReason, InboxCredential,
    RegistrationRecord,
};

/// Owns the lifecycle state machine and runs the activation pipeline.
pub struct DomainLifecycleCoordinator {
    ctx: Arc<PipelineContext>,
    in_flight: Arc<InFlightRuns>,
    state_lock: Mutex<()>,
}

impl DomainLifecycleCoordinator {
    #[must_use]
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            in_flight: Arc::new(InFlightRuns::new()),
            state_lock: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    // ===== Registration =====

    /// Record a completed purchase and move the new domain to `pending_dns`.
    pub async fn register_purchase(
        &self,
        tenant_id: &str,
        registration: RegistrationRecord,
    ) -> CoreResult<Domain> {
        let name = validate_domain(&registration.domain)?;
        if tenant_id.trim().is_empty() {
            return Err(CoreError::ValidationError("tenant id is required".to_string()));
        }

        let _guard = self.state_lock.lock().await;
        if self
            .ctx
            .domain_repository
            .find_by_name(tenant_id, &name)
            .await?
            .is_some()
        {
            return Err(CoreError::DomainExists(name));
        }

        let mut domain = Domain::new(tenant_id, &name, &self.ctx.settings.dkim_selector);
        domain.registrar = Some(registration.registrar);
        domain.registration_id = Some(registration.registration_id);
        domain.purchase_price_cents = Some(registration.price_cents);
        domain.purchased_at = Some(registration.purchased_at);
        domain.expires_at = Some(registration.expires_at);
        domain.auto_renew = registration.auto_renew;
        Self::apply_transition(&mut domain, DomainStatus::PendingDns)?;

        self.ctx.domain_repository.save(&domain).await?;
        log::info!("[lifecycle] {name}: registered for tenant {tenant_id} ({})", domain.id);
        Ok(domain)
    }

    // ===== Activation pipeline =====

    /// Run (or resume) the activation pipeline and return the resulting status.
    ///
    /// - Propagation not yet visible: `Ok(PendingDns)`, to be retried later.
    /// - Partial publishing: `Err(PublishIncomplete)`; the domain stays `pending_dns`, or
    ///   becomes `failed` once the transport gave up or the attempt budget is spent.
    /// - NXDOMAIN: `Err(DomainNotResolvable)`, domain stays `pending_dns`.
    /// - Already `active`, `suspended` or `expired`: no upstream calls, current status.
    pub async fn activate_pipeline(&self, domain_id: &str) -> CoreResult<DomainStatus> {
        let claim = self.in_flight.claim(domain_id, &self.ctx.shutdown)?;
        let cancel = claim.token().clone();

        let result = self.run_pipeline(domain_id, &cancel).await;
        if let Err(e) = &result {
            if e.is_expected() {
                log::warn!("[lifecycle] {domain_id}: activation stopped: {e}");
            } else {
                log::error!("[lifecycle] {domain_id}: activation failed: {e}");
            }
        }
        drop(claim);
        result
    }

    async fn run_pipeline(
        &self,
        domain_id: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<DomainStatus> {
        let mut domain = self.load(domain_id).await?;

        match domain.status {
            DomainStatus::Active | DomainStatus::Suspended | DomainStatus::Expired => {
                log::debug!("[lifecycle] {}: nothing to do in {}", domain.name, domain.status);
                return Ok(domain.status);
            }
            DomainStatus::PendingPurchase | DomainStatus::Failed => {
                return Err(CoreError::InvalidTransition {
                    domain: domain.name,
                    from: domain.status,
                    to: DomainStatus::DnsVerified,
                });
            }
            DomainStatus::PendingDns => {
                domain = match self.verify_dns(domain, cancel).await? {
                    Ok(verified) => verified,
                    Err(status) => return Ok(status),
                };
            }
            DomainStatus::DnsVerified => {}
        }

        self.authorize_relay(domain, cancel).await
    }

    /// `pending_dns -> dns_verified`. `Ok(Err(status))` means the run stopped early
    /// without error (propagation timeout, cancellation, suspension).
    async fn verify_dns(
        &self,
        domain: Domain,
        cancel: &CancellationToken,
    ) -> CoreResult<Result<Domain, DomainStatus>> {
        // 1. zone
        let zone_id = match self.ensure_zone(&domain).await {
            Ok(zone_id) => zone_id,
            Err(e) => {
                let exhausted = matches!(e, ProviderError::RetriesExhausted { .. });
                return Err(self
                    .publishing_failed(&domain.id, exhausted, true, cancel, e.into())
                    .await);
            }
        };
        if cancel.is_cancelled() {
            return Ok(Err(self.stopped(&domain.id).await?));
        }

        // 2. key material
        let key = match key_service::ensure_active_key(&self.ctx, &domain.id, &domain.dkim_selector).await {
            Ok(key) => key,
            Err(e) => {
                self.record_failure(&domain.id, e.failure_reason()).await;
                return Err(e);
            }
        };
        let key_id = key.id.clone();
        let domain = self.patch(&domain.id, |d| d.dkim_key_id = Some(key_id)).await?;

        // 3. records
        let (report, entries) =
            publish_missing(&self.ctx, &domain, &zone_id, &key.public_record_value, cancel).await;
        let wrote =
            !cancel.is_cancelled() && (!entries.is_empty() || !report.failed.is_empty());
        let domain = self
            .patch(&domain.id, |d| {
                for entry in entries {
                    d.upsert_record(entry);
                }
                if wrote {
                    d.publish_attempts += 1;
                }
            })
            .await?;
        if cancel.is_cancelled() {
            return Ok(Err(self.stopped(&domain.id).await?));
        }
        if !report.is_complete() {
            let err = CoreError::PublishIncomplete {
                published: report.published.clone(),
                failed: report.failed.clone(),
            };
            return Err(self
                .publishing_failed(&domain.id, report.exhausted, false, cancel, err)
                .await);
        }
        log::info!(
            "[lifecycle] {}: records in place ({} new, {} already present)",
            domain.name,
            report.published.len(),
            report.skipped.len()
        );

        // 4. propagation
        let settings = &self.ctx.settings;
        let waits = cancel.child_token();
        let spf = async {
            let outcome = self
                .ctx
                .verifier
                .await_spf(
                    &domain.name,
                    settings.server_ip,
                    settings.propagation_timeout,
                    settings.propagation_interval,
                    &waits,
                )
                .await;
            if outcome == PropagationOutcome::NxDomain {
                waits.cancel();
            }
            outcome
        };
        let dkim = async {
            let outcome = self
                .ctx
                .verifier
                .await_dkim(
                    &domain.name,
                    &domain.dkim_selector,
                    settings.propagation_timeout,
                    settings.propagation_interval,
                    &waits,
                )
                .await;
            if outcome == PropagationOutcome::NxDomain {
                waits.cancel();
            }
            outcome
        };
        let (spf, dkim) = tokio::join!(spf, dkim);

        if cancel.is_cancelled() {
            return Ok(Err(self.stopped(&domain.id).await?));
        }
        if spf == PropagationOutcome::NxDomain || dkim == PropagationOutcome::NxDomain {
            self.record_failure(&domain.id, Some(FailureReason::Nxdomain)).await;
            return Err(CoreError::DomainNotResolvable(domain.name));
        }
        if !(spf.is_visible() && dkim.is_visible()) {
            log::info!(
                "[lifecycle] {}: records not visible yet (spf: {spf:?}, dkim: {dkim:?})",
                domain.name
            );
            self.record_failure(&domain.id, Some(FailureReason::PropagationTimeout))
                .await;
            return Ok(Err(DomainStatus::PendingDns));
        }

        // 5. commit
        let domain = self
            .transition(&domain.id, DomainStatus::PendingDns, DomainStatus::DnsVerified, Some(cancel), |d| {
                d.dns_verified_at = Some(Utc::now());
                d.failure_reason = None;
                d.publish_attempts = 0;
            })
            .await?;
        if domain.status == DomainStatus::DnsVerified {
            log::info!("[lifecycle] {}: DNS verified", domain.name);
            Ok(Ok(domain))
        } else {
            Ok(Err(domain.status))
        }
    }

    /// Zone id of the domain, creating (or adopting) the zone on first use.
    async fn ensure_zone(&self, domain: &Domain) -> Result<String, ProviderError> {
        if let Some(zone_id) = &domain.zone_id {
            return Ok(zone_id.clone());
        }

        let publisher = &self.ctx.publisher;
        let zone = match publisher
            .create_zone(&domain.name, &self.ctx.settings.account_id)
            .await
        {
            Ok(zone) => zone,
            Err(e @ ProviderError::RecordExists { .. }) => {
                publisher.find_zone(&domain.name).await?.ok_or(e)?
            }
            Err(e) => return Err(e),
        };
        log::info!(
            "[lifecycle] {}: zone {} ({})",
            domain.name,
            zone.id,
            zone.name_servers.join(", ")
        );

        let zone_id = zone.id.clone();
        self.patch(&domain.id, |d| {
            d.zone_id = Some(zone.id);
            d.name_servers = zone.name_servers;
        })
        .await
        .map_err(|e| ProviderError::SerializationError {
            provider: publisher.id().to_string(),
            detail: format!("zone {zone_id} created but not recorded: {e}"),
        })?;
        Ok(zone_id)
    }

    /// Account for a failed publishing attempt; move to `failed` once retries are spent.
    ///
    /// `count_attempt` is set when the attempt has not been counted on the domain yet.
    async fn publishing_failed(
        &self,
        domain_id: &str,
        exhausted: bool,
        count_attempt: bool,
        cancel: &CancellationToken,
        err: CoreError,
    ) -> CoreError {
        if cancel.is_cancelled() {
            return err;
        }
        let max_attempts = self.ctx.settings.max_publish_attempts;
        let stored = if count_attempt {
            self.patch(domain_id, |d| d.publish_attempts += 1).await
        } else {
            self.load(domain_id).await
        };
        let attempts = match stored {
            Ok(d) => d.publish_attempts,
            Err(e) => return e,
        };

        if exhausted || attempts >= max_attempts {
            let result = self
                .transition(domain_id, DomainStatus::PendingDns, DomainStatus::Failed, Some(cancel), |d| {
                    d.failure_reason = Some(FailureReason::DnsPublishFailed);
                })
                .await;
            match result {
                Ok(d) if d.status == DomainStatus::Failed => log::error!(
                    "[lifecycle] {}: DNS publishing gave up after {attempts} attempt(s)",
                    d.name
                ),
                Ok(_) => {}
                Err(e) => log::error!("[lifecycle] {domain_id}: could not record failure: {e}"),
            }
        } else {
            self.record_failure(domain_id, err.failure_reason()).await;
        }
        err
    }

    /// `dns_verified -> active`.
    async fn authorize_relay(
        &self,
        domain: Domain,
        cancel: &CancellationToken,
    ) -> CoreResult<DomainStatus> {
        let inboxes = self.ctx.inbox_repository.find_by_domain(&domain.id).await?;
        let credentials: Vec<RelayCredential> =
            inboxes.iter().map(InboxCredential::to_relay).collect();

        if let Err(e) = relay_service::authorize(&self.ctx, &domain.name, &credentials, cancel).await {
            if cancel.is_cancelled() {
                return self.stopped(&domain.id).await;
            }
            self.record_failure(&domain.id, e.failure_reason()).await;
            return Err(e);
        }

        let committed = self
            .transition(&domain.id, DomainStatus::DnsVerified, DomainStatus::Active, Some(cancel), |d| {
                d.relay_authorized = true;
                d.relay_authorized_at = Some(Utc::now());
                d.failure_reason = None;
            })
            .await?;

        if committed.status != DomainStatus::Active {
            // suspended while the relay call was in flight: take the grant back
            if committed.status == DomainStatus::Suspended {
                self.take_back_grant(&committed.name).await;
            }
            return Ok(committed.status);
        }

        self.mark_inboxes_authorized(inboxes).await?;
        log::info!(
            "[lifecycle] {}: active ({} inbox(es))",
            committed.name,
            credentials.len()
        );
        Ok(DomainStatus::Active)
    }

    // ===== Kill switch =====

    /// Suspend a domain: stop any run, then pull it from the relay. DNS and keys stay.
    ///
    /// Suspending an already suspended domain re-stamps it, cancels whatever run is in
    /// flight and retries a revoke that did not go through earlier.
    pub async fn suspend(&self, domain_id: &str, reason: &str) -> CoreResult<DomainStatus> {
        let domain = {
            let _guard = self.state_lock.lock().await;
            let mut domain = self.load(domain_id).await?;
            if domain.status != DomainStatus::Suspended {
                Self::apply_transition(&mut domain, DomainStatus::Suspended)?;
            }
            domain.suspension_reason = Some(reason.to_string());
            domain.suspended_at = Some(Utc::now());
            domain.touch();
            self.ctx.domain_repository.save(&domain).await?;
            // cancelled under the lock so no commit can slip in between
            if self.in_flight.cancel(domain_id) {
                log::info!("[lifecycle] {}: cancelled in-flight run", domain.name);
            }
            domain
        };
        log::warn!("[lifecycle] {}: suspended: {reason}", domain.name);

        if domain.relay_authorized {
            relay_service::revoke(&self.ctx, &domain.name, &self.ctx.shutdown).await?;
            self.patch(domain_id, |d| {
                d.relay_authorized = false;
                d.relay_authorized_at = None;
            })
            .await?;
        }
        Ok(DomainStatus::Suspended)
    }

    /// Lift a suspension. Verified domains go straight back to `active` after
    /// re-authorization; domains suspended before verification return to `pending_dns`.
    pub async fn reactivate(&self, domain_id: &str) -> CoreResult<DomainStatus> {
        let claim = self.in_flight.claim(domain_id, &self.ctx.shutdown)?;
        let cancel = claim.token().clone();
        let domain = self.load(domain_id).await?;

        match domain.status {
            DomainStatus::Active => return Ok(DomainStatus::Active),
            DomainStatus::Suspended => {}
            other => {
                return Err(CoreError::InvalidTransition {
                    domain: domain.name,
                    from: other,
                    to: DomainStatus::Active,
                })
            }
        }

        if domain.dns_verified_at.is_none() {
            let domain = self
                .transition(domain_id, DomainStatus::Suspended, DomainStatus::PendingDns, Some(&cancel), |d| {
                    d.suspension_reason = None;
                    d.suspended_at = None;
                })
                .await?;
            log::info!("[lifecycle] {}: reactivated into {}", domain.name, domain.status);
            return Ok(domain.status);
        }

        let inboxes = self.ctx.inbox_repository.find_by_domain(domain_id).await?;
        let credentials: Vec<RelayCredential> =
            inboxes.iter().map(InboxCredential::to_relay).collect();
        if let Err(e) = relay_service::authorize(&self.ctx, &domain.name, &credentials, &cancel).await {
            if cancel.is_cancelled() {
                self.take_back_grant(&domain.name).await;
                return self.stopped(domain_id).await;
            }
            return Err(e);
        }

        let committed = {
            let _guard = self.state_lock.lock().await;
            let mut current = self.load(domain_id).await?;
            // a suspension that arrived after we loaded the domain wins
            if current.status == DomainStatus::Suspended
                && current.suspended_at == domain.suspended_at
                && !cancel.is_cancelled()
            {
                Self::apply_transition(&mut current, DomainStatus::Active)?;
                current.suspension_reason = None;
                current.suspended_at = None;
                current.relay_authorized = true;
                current.relay_authorized_at = Some(Utc::now());
                current.failure_reason = None;
                self.ctx.domain_repository.save(&current).await?;
            }
            current
        };
        drop(claim);

        if committed.status != DomainStatus::Active {
            if committed.status == DomainStatus::Suspended {
                self.take_back_grant(&committed.name).await;
            }
            return Ok(committed.status);
        }
        self.mark_inboxes_authorized(inboxes).await?;
        log::info!("[lifecycle] {}: reactivated", committed.name);
        Ok(DomainStatus::Active)
    }

    /// Explicit retry of a failed domain: `failed -> pending_dns` with a fresh budget.
    pub async fn retry_failed(&self, domain_id: &str) -> CoreResult<DomainStatus> {
        let _guard = self.state_lock.lock().await;
        let mut domain = self.load(domain_id).await?;
        Self::apply_transition(&mut domain, DomainStatus::PendingDns)?;
        domain.publish_attempts = 0;
        domain.failure_reason = None;
        self.ctx.domain_repository.save(&domain).await?;
        Ok(domain.status)
    }

    /// External renewal signal that the registration lapsed.
    ///
    /// Repeating it on an expired domain retries a revoke that did not go through.
    pub async fn mark_expired(&self, domain_id: &str) -> CoreResult<DomainStatus> {
        let domain = {
            let _guard = self.state_lock.lock().await;
            let mut domain = self.load(domain_id).await?;
            if domain.status != DomainStatus::Expired {
                Self::apply_transition(&mut domain, DomainStatus::Expired)?;
                self.ctx.domain_repository.save(&domain).await?;
            }
            domain
        };
        if domain.relay_authorized {
            relay_service::revoke(&self.ctx, &domain.name, &self.ctx.shutdown).await?;
            self.patch(domain_id, |d| {
                d.relay_authorized = false;
                d.relay_authorized_at = None;
            })
            .await?;
        }
        Ok(DomainStatus::Expired)
    }

    // ===== Health =====

    pub async fn get_health(&self, domain_id: &str) -> CoreResult<DomainHealth> {
        let domain = self.load(domain_id).await?;
        let inbox_count = self.ctx.inbox_repository.find_by_domain(domain_id).await?.len();
        Ok(DomainHealth {
            domain_id: domain.id,
            domain: domain.name,
            status: domain.status,
            dns_verified: domain.dns_verified_at.is_some(),
            dns_verified_at: domain.dns_verified_at,
            relay_authorized: domain.relay_authorized,
            relay_authorized_at: domain.relay_authorized_at,
            inbox_count,
            reason_code: domain.failure_reason.map(|r| r.as_str().to_string()),
            expires_at: domain.expires_at,
        })
    }

    // ===== DNS maintenance =====

    /// Tighten (or relax) the DMARC policy by rewriting the recorded record in place.
    pub async fn set_dmarc_policy(&self, domain_id: &str, policy: DmarcPolicy) -> CoreResult<Domain> {
        let domain = self.load(domain_id).await?;
        Self::require_verified(&domain)?;
        let zone_id = Self::zone_of(&domain)?;
        let entry = domain
            .record(RecordPurpose::Dmarc)
            .cloned()
            .ok_or_else(|| CoreError::RecordNotFound(format!("_dmarc.{}", domain.name)))?;

        let spec = dmarc_spec(&self.ctx.settings, &domain, policy);
        let updated = self
            .ctx
            .publisher
            .update_record(&zone_id, &entry.record_id, &spec)
            .await?;
        log::info!("[lifecycle] {}: DMARC policy now {policy}", domain.name);

        self.patch(domain_id, |d| {
            d.dmarc_policy = policy;
            d.upsert_record(DnsRecordEntry::from_published(RecordPurpose::Dmarc, updated));
        })
        .await
    }

    /// Rotate onto a new selector. The old key is retired but its record stays
    /// published so mail signed with it keeps verifying.
    pub async fn rotate_dkim_key(&self, domain_id: &str, new_selector: &str) -> CoreResult<DkimKey> {
        let _claim = self.in_flight.claim(domain_id, &self.ctx.shutdown)?;
        let domain = self.load(domain_id).await?;
        Self::require_verified(&domain)?;
        let zone_id = Self::zone_of(&domain)?;

        let new_selector = new_selector.trim().to_ascii_lowercase();
        if !is_valid_selector(&new_selector) {
            return Err(CoreError::ValidationError(format!(
                "invalid DKIM selector: {new_selector:?}"
            )));
        }
        if new_selector == domain.dkim_selector {
            return Err(CoreError::ValidationError(format!(
                "selector {new_selector} is already active"
            )));
        }

        let key = key_service::generate_key(&self.ctx, &domain.id, &new_selector).await?;
        let spec = RecordSpec::dkim(&domain.name, &new_selector, &key.public_record_value);
        // rotating back onto a retired selector rewrites its record in place
        let previous_record = domain
            .dns_records
            .iter()
            .find(|r| r.purpose == RecordPurpose::Dkim && r.name == spec.name)
            .map(|r| r.record_id.clone());
        let published = match previous_record {
            Some(record_id) => {
                self.ctx
                    .publisher
                    .update_record(&zone_id, &record_id, &spec)
                    .await?
            }
            None => match self
                .ctx
                .publisher
                .create_dkim_record(&zone_id, &domain.name, &new_selector, &key.public_record_value)
                .await
            {
                Ok(record) => record,
                Err(e @ ProviderError::RecordExists { .. }) => {
                    adopt_existing(self.ctx.publisher.as_ref(), &zone_id, &spec)
                        .await?
                        .ok_or(e)?
                }
                Err(e) => return Err(e.into()),
            },
        };

        if let Some(mut previous) = self
            .ctx
            .dkim_key_repository
            .find_active(&domain.id, &domain.dkim_selector)
            .await?
        {
            previous.retire();
            self.ctx.dkim_key_repository.save(&previous).await?;
        }
        self.ctx.dkim_key_repository.save(&key).await?;

        let key_id = key.id.clone();
        let selector = new_selector.clone();
        self.patch(domain_id, |d| {
            d.dkim_selector = selector;
            d.dkim_key_id = Some(key_id);
            d.upsert_record(DnsRecordEntry::from_published(RecordPurpose::Dkim, published));
        })
        .await?;
        log::info!(
            "[lifecycle] {}: DKIM rotated {} -> {new_selector}",
            domain.name,
            domain.dkim_selector
        );
        Ok(key)
    }

    // ===== Inboxes =====

    /// Queue inbox credentials. Active domains get them pushed to the relay right away;
    /// others pick them up at activation.
    pub async fn queue_inbox_credentials(
        &self,
        domain_id: &str,
        credentials: Vec<RelayCredential>,
    ) -> CoreResult<usize> {
        let domain = self.load(domain_id).await?;
        if let Some(bad) = credentials
            .iter()
            .find(|c| c.username.trim().is_empty() || c.credential_hash.is_empty())
        {
            return Err(CoreError::ValidationError(format!(
                "inbox credential for {:?} is incomplete",
                bad.username
            )));
        }

        let mut queued = Vec::with_capacity(credentials.len());
        for credential in &credentials {
            let inbox = InboxCredential::new(domain_id, &credential.username, &credential.credential_hash);
            self.ctx.inbox_repository.save(&inbox).await?;
            queued.push(inbox);
        }

        if domain.status == DomainStatus::Active {
            relay_service::authorize(&self.ctx, &domain.name, &credentials, &self.ctx.shutdown)
                .await?;
            self.mark_inboxes_authorized(queued).await?;
            log::info!(
                "[lifecycle] {}: authorized {} new inbox(es)",
                domain.name,
                credentials.len()
            );
        } else {
            log::info!(
                "[lifecycle] {}: queued {} inbox(es) until activation",
                domain.name,
                credentials.len()
            );
        }
        Ok(credentials.len())
    }

    pub async fn remove_inbox(&self, domain_id: &str, username: &str) -> CoreResult<()> {
        let domain = self.load(domain_id).await?;
        let inbox = self
            .ctx
            .inbox_repository
            .find_by_domain(domain_id)
            .await?
            .into_iter()
            .find(|i| i.username == username)
            .ok_or_else(|| CoreError::RecordNotFound(format!("{username}@{}", domain.name)))?;

        if inbox.authorized || domain.relay_authorized {
            relay_service::deauthorize(&self.ctx, &domain.name, username, &self.ctx.shutdown)
                .await?;
        }
        self.ctx.inbox_repository.delete(domain_id, username).await?;
        log::info!("[lifecycle] {}: removed inbox {username}", domain.name);
        Ok(())
    }

    // ===== Teardown =====

    /// Relay first, then DNS, then local state. Stops at the first failure so nothing
    /// local is dropped while upstream state still references it.
    pub async fn delete_domain(&self, domain_id: &str) -> CoreResult<()> {
        let _claim = self.in_flight.claim(domain_id, &self.ctx.shutdown)?;
        let domain = self.load(domain_id).await?;
        let shutdown = &self.ctx.shutdown;

        let inboxes = self.ctx.inbox_repository.find_by_domain(domain_id).await?;
        for inbox in &inboxes {
            relay_service::deauthorize(&self.ctx, &domain.name, &inbox.username, shutdown).await?;
        }
        if domain.relay_authorized || !inboxes.is_empty() {
            relay_service::revoke(&self.ctx, &domain.name, shutdown).await?;
        }

        if let Some(zone_id) = &domain.zone_id {
            for record in &domain.dns_records {
                match self.ctx.publisher.delete_record(zone_id, &record.record_id).await {
                    Ok(()) | Err(ProviderError::RecordNotFound { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            match self.ctx.publisher.delete_zone(zone_id).await {
                Ok(()) | Err(ProviderError::DomainNotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.ctx.dkim_key_repository.delete_by_domain(domain_id).await?;
        self.ctx.inbox_repository.delete_by_domain(domain_id).await?;
        self.ctx.domain_repository.delete(domain_id).await?;
        log::info!("[lifecycle] {}: deleted", domain.name);
        Ok(())
    }

    // ===== Helpers =====

    async fn load(&self, domain_id: &str) -> CoreResult<Domain> {
        self.ctx
            .domain_repository
            .find_by_id(domain_id)
            .await?
            .ok_or_else(|| CoreError::DomainNotFound(domain_id.to_string()))
    }

    fn apply_transition(domain: &mut Domain, to: DomainStatus) -> CoreResult<()> {
        if !domain.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                domain: domain.name.clone(),
                from: domain.status,
                to,
            });
        }
        log::debug!("[lifecycle] {}: {} -> {to}", domain.name, domain.status);
        domain.status = to;
        domain.touch();
        Ok(())
    }

    /// Patch stored fields under the state lock. Never touches `status`.
    async fn patch<F>(&self, domain_id: &str, apply: F) -> CoreResult<Domain>
    where
        F: FnOnce(&mut Domain) + Send,
    {
        let _guard = self.state_lock.lock().await;
        let mut domain = self.load(domain_id).await?;
        let status = domain.status;
        apply(&mut domain);
        domain.status = status;
        domain.touch();
        self.ctx.domain_repository.save(&domain).await?;
        Ok(domain)
    }

    /// Move `from -> to` under the state lock, re-reading the stored status first.
    ///
    /// Returns the stored domain unchanged when its status is no longer `from` or the
    /// run was cancelled; callers compare the returned status with `to`.
    async fn transition<F>(
        &self,
        domain_id: &str,
        from: DomainStatus,
        to: DomainStatus,
        cancel: Option<&CancellationToken>,
        apply: F,
    ) -> CoreResult<Domain>
    where
        F: FnOnce(&mut Domain) + Send,
    {
        let _guard = self.state_lock.lock().await;
        let mut domain = self.load(domain_id).await?;
        if domain.status != from || cancel.is_some_and(CancellationToken::is_cancelled) {
            log::info!(
                "[lifecycle] {}: not moving to {to}, status is {}",
                domain.name,
                domain.status
            );
            return Ok(domain);
        }
        Self::apply_transition(&mut domain, to)?;
        apply(&mut domain);
        self.ctx.domain_repository.save(&domain).await?;
        Ok(domain)
    }

    /// Persist a reason code; failures to do so are logged only.
    async fn record_failure(&self, domain_id: &str, reason: Option<FailureReason>) {
        let Some(reason) = reason else {
            return;
        };
        if let Err(e) = self.patch(domain_id, |d| d.failure_reason = Some(reason)).await {
            log::error!("[lifecycle] {domain_id}: could not record {reason}: {e}");
        }
    }

    /// Status of a run that stopped because its token fired.
    /// Revoke a grant the relay may hold for a run that lost to a suspension.
    async fn take_back_grant(&self, domain: &str) {
        log::warn!("[lifecycle] {domain}: suspended during relay authorization, revoking");
        let detached = CancellationToken::new();
        if let Err(e) = relay_service::revoke(&self.ctx, domain, &detached).await {
            log::error!("[lifecycle] {domain}: compensation revoke failed: {e}");
        }
    }

    async fn stopped(&self, domain_id: &str) -> CoreResult<DomainStatus> {
        let status = self.load(domain_id).await?.status;
        log::info!("[lifecycle] {domain_id}: run cancelled, status stays {status}");
        Ok(status)
    }

    async fn mark_inboxes_authorized(&self, inboxes: Vec<InboxCredential>) -> CoreResult<()> {
        for mut inbox in inboxes.into_iter().filter(|i| !i.authorized) {
            inbox.authorized = true;
            self.ctx.inbox_repository.save(&inbox).await?;
        }
        Ok(())
    }

    fn require_verified(domain: &Domain) -> CoreResult<()> {
        match domain.status {
            DomainStatus::DnsVerified | DomainStatus::Active => Ok(()),
            other => Err(CoreError::ValidationError(format!(
                "{} is {other}; DNS must be verified first",
                domain.name
            ))),
        }
    }

    fn zone_of(domain: &Domain) -> CoreResult<String> {
        domain
            .zone_id
            .clone()
            .ok_or_else(|| CoreError::RecordNotFound(format!("zone for {}", domain.name)))
    }
}

/// DKIM selectors are single DNS labels.
fn is_valid_selector(selector: &str) -> bool {
    !selector.is_empty()
        && selector.len() <= 63
        && !selector.starts_with('-')
        && !selector.ends_with('-')
        && selector
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}
