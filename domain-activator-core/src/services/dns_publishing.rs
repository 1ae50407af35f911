//! Record publishing fan-out

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use domain_activator_provider::{
    DmarcPolicy, DnsRecordPublisher, ProviderError, PublishedRecord, RecordPurpose, RecordSpec,
};

use crate::error::CoreError;
use crate::services::{PipelineContext, PipelineSettings};
use crate::types::{DnsRecordEntry, Domain, PublishReport, RecordFailure};

/// Everything a domain needs published, in a stable order.
pub(crate) fn required_records(
    settings: &PipelineSettings,
    domain: &Domain,
    dkim_value: &str,
) -> Vec<RecordSpec> {
    let mut specs = vec![
        RecordSpec::spf(&domain.name, settings.server_ip),
        RecordSpec::dkim(&domain.name, &domain.dkim_selector, dkim_value),
        RecordSpec::dmarc(
            &domain.name,
            domain.dmarc_policy,
            &settings.dmarc_report_email,
        ),
        RecordSpec::mx(&domain.name, &settings.mail_host, settings.mx_priority),
    ];
    if settings.publish_a_record {
        specs.push(RecordSpec::a(&domain.name, settings.server_ip));
    }
    specs
}

/// Publish every required record the domain has not recorded yet, concurrently.
///
/// Records already recorded on the domain are skipped without a provider call. Returns
/// the report and the entries for the records created (or adopted) in this run.
pub(crate) async fn publish_missing(
    ctx: &PipelineContext,
    domain: &Domain,
    zone_id: &str,
    dkim_value: &str,
    cancel: &CancellationToken,
) -> (PublishReport, Vec<DnsRecordEntry>) {
    let mut report = PublishReport::default();
    let mut pending = Vec::new();

    for spec in required_records(&ctx.settings, domain, dkim_value) {
        if domain.has_record(spec.purpose, &spec.name) {
            report.skipped.push(spec.purpose);
        } else {
            pending.push(spec);
        }
    }

    if pending.is_empty() {
        log::debug!("[lifecycle] {}: all records already published", domain.name);
        return (report, Vec::new());
    }

    let futures = pending.into_iter().map(|spec| async move {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ProviderError::Cancelled {
                provider: ctx.publisher.id().to_string(),
            }),
            r = publish_one(ctx, zone_id, domain, &spec) => r,
        };
        (spec.purpose, result)
    });

    let mut entries = Vec::new();
    for (purpose, result) in join_all(futures).await {
        match result {
            Ok(record) => {
                log::info!(
                    "[lifecycle] {}: published {purpose} record {}",
                    domain.name,
                    record.id
                );
                report.published.push(purpose);
                entries.push(DnsRecordEntry::from_published(purpose, record));
            }
            Err(e) => {
                if e.is_expected() {
                    log::warn!("[lifecycle] {}: {purpose} record failed: {e}", domain.name);
                } else {
                    log::error!("[lifecycle] {}: {purpose} record failed: {e}", domain.name);
                }
                report.exhausted |= matches!(e, ProviderError::RetriesExhausted { .. });
                let message = e.to_string();
                report.failed.push(RecordFailure {
                    purpose,
                    reason_code: CoreError::from(e).reason_code().to_string(),
                    message,
                });
            }
        }
    }

    (report, entries)
}

/// Create one record through the typed publisher call, adopting an existing one on
/// conflict.
async fn publish_one(
    ctx: &PipelineContext,
    zone_id: &str,
    domain: &Domain,
    spec: &RecordSpec,
) -> Result<PublishedRecord, ProviderError> {
    let publisher = ctx.publisher.as_ref();
    let settings = &ctx.settings;
    let name = domain.name.as_str();

    let created = match spec.purpose {
        RecordPurpose::Spf => {
            publisher
                .create_spf_record(zone_id, name, settings.server_ip)
                .await
        }
        RecordPurpose::Dkim => {
            publisher
                .create_dkim_record(zone_id, name, &domain.dkim_selector, &spec.content)
                .await
        }
        RecordPurpose::Dmarc => {
            publisher
                .create_dmarc_record(zone_id, name, domain.dmarc_policy, &settings.dmarc_report_email)
                .await
        }
        RecordPurpose::Mx => {
            publisher
                .create_mx_record(zone_id, name, &settings.mail_host, settings.mx_priority)
                .await
        }
        RecordPurpose::A => publisher.create_a_record(zone_id, name, settings.server_ip).await,
    };

    match created {
        Err(e @ ProviderError::RecordExists { .. }) => adopt_existing(publisher, zone_id, spec)
            .await?
            .ok_or(e),
        other => other,
    }
}

/// A record left by an earlier, interrupted run: take it over, rewriting its content if
/// it drifted.
pub(crate) async fn adopt_existing(
    publisher: &dyn DnsRecordPublisher,
    zone_id: &str,
    spec: &RecordSpec,
) -> Result<Option<PublishedRecord>, ProviderError> {
    let existing = publisher
        .find_records(zone_id, &spec.name, spec.record_type)
        .await?;
    let Some(found) = existing
        .into_iter()
        .find(|r| same_purpose(spec, &r.content))
    else {
        return Ok(None);
    };

    if found.content == spec.content && found.priority == spec.priority {
        log::info!("[lifecycle] adopted existing {} record {}", spec.purpose, found.id);
        return Ok(Some(found));
    }

    log::info!("[lifecycle] rewriting drifted {} record {}", spec.purpose, found.id);
    publisher
        .update_record(zone_id, &found.id, spec)
        .await
        .map(Some)
}

/// Whether an existing record's content belongs to the same purpose as `spec`.
fn same_purpose(spec: &RecordSpec, content: &str) -> bool {
    let content = content.trim_matches('"');
    match spec.purpose {
        RecordPurpose::Spf => content.starts_with("v=spf1"),
        RecordPurpose::Dkim => content.starts_with("v=DKIM1"),
        RecordPurpose::Dmarc => content.starts_with("v=DMARC1"),
        RecordPurpose::Mx | RecordPurpose::A => {
            content.trim_end_matches('.').eq_ignore_ascii_case(&spec.content)
        }
    }
}

/// DMARC spec for `policy`, reusing the domain's report address.
pub(crate) fn dmarc_spec(settings: &PipelineSettings, domain: &Domain, policy: DmarcPolicy) -> RecordSpec {
    RecordSpec::dmarc(&domain.name, policy, &settings.dmarc_report_email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            server_ip: Ipv4Addr::new(203, 0, 113, 10),
            mail_host: "mail.acme-demo.test".into(),
            dmarc_report_email: "dmarc@acme-demo.test".into(),
            ..PipelineSettings::default()
        }
    }

    #[test]
    fn required_records_cover_mail_authentication() {
        let domain = Domain::new("t1", "acme-demo.test", "mail2025");
        let specs = required_records(&settings(), &domain, "v=DKIM1; k=rsa; p=AAAA");

        let purposes: Vec<_> = specs.iter().map(|s| s.purpose).collect();
        assert_eq!(
            purposes,
            [
                RecordPurpose::Spf,
                RecordPurpose::Dkim,
                RecordPurpose::Dmarc,
                RecordPurpose::Mx
            ]
        );
        assert_eq!(specs[0].content, "v=spf1 ip4:203.0.113.10 -all");
        assert_eq!(specs[1].name, "mail2025._domainkey.acme-demo.test");
        assert_eq!(
            specs[2].content,
            "v=DMARC1; p=none; rua=mailto:dmarc@acme-demo.test"
        );
        assert_eq!(specs[3].priority, Some(10));
    }

    #[test]
    fn a_record_is_opt_in() {
        let domain = Domain::new("t1", "acme-demo.test", "mail2025");
        let mut s = settings();
        s.publish_a_record = true;
        let specs = required_records(&s, &domain, "v=DKIM1; k=rsa; p=AAAA");
        assert_eq!(specs.last().map(|s| s.purpose), Some(RecordPurpose::A));
        assert_eq!(specs.last().and_then(|s| s.proxied), Some(false));
    }

    #[test]
    fn purpose_matching_ignores_foreign_txt() {
        let spf = RecordSpec::spf("acme-demo.test", Ipv4Addr::new(203, 0, 113, 10));
        assert!(same_purpose(&spf, "\"v=spf1 include:_spf.example.net -all\""));
        assert!(!same_purpose(&spf, "google-site-verification=abc"));

        let mx = RecordSpec::mx("acme-demo.test", "mail.acme-demo.test.", 10);
        assert!(same_purpose(&mx, "MAIL.acme-demo.test."));
        assert!(!same_purpose(&mx, "mx.other.test"));
    }
}
