//! Cloudflare publisher against a mock API

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

mod common;

use std::net::Ipv4Addr;

use common::{cf_err, cf_ok, cf_record, cloudflare, cloudflare_with_token};
use domain_activator_provider::{
    DmarcPolicy, DnsRecordPublisher, DnsRecordType, ProviderError, RecordSpec,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn create_zone_sends_account_and_auth_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/zones"))
        .and(header("Authorization", "Bearer cf-test-token"))
        .and(header("X-Auth-Email", "ops@acme-demo.test"))
        .and(body_partial_json(json!({
            "name": "acme-demo.test",
            "account": { "id": "acct-9" },
            "type": "full",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_ok(json!({
            "id": "zone-1",
            "name": "acme-demo.test",
            "status": "pending",
            "name_servers": ["ada.ns.cloudflare.com", "bob.ns.cloudflare.com"],
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let zone = cloudflare(&server, 0)
        .create_zone("acme-demo.test", "acct-9")
        .await
        .unwrap();

    assert_eq!(zone.id, "zone-1");
    assert_eq!(zone.name_servers.len(), 2);
}

#[tokio::test]
async fn find_zone_filters_by_exact_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("name", "acme-demo.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_ok(json!([
            { "id": "zone-1", "name": "acme-demo.test", "status": "active" }
        ]))))
        .mount(&server)
        .await;

    let publisher = cloudflare(&server, 0);
    let zone = publisher.find_zone("acme-demo.test").await.unwrap();
    assert_eq!(zone.map(|z| z.id).as_deref(), Some("zone-1"));
}

#[tokio::test]
async fn spf_and_mx_records_use_fixed_content_and_ttl() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/zones/zone-1/dns_records"))
        .and(body_partial_json(json!({
            "type": "TXT",
            "name": "acme-demo.test",
            "content": "v=spf1 ip4:203.0.113.10 -all",
            "ttl": 3600,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_ok(cf_record(
            "rec-spf",
            "TXT",
            "acme-demo.test",
            "v=spf1 ip4:203.0.113.10 -all",
        ))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/zones/zone-1/dns_records"))
        .and(body_partial_json(json!({
            "type": "MX",
            "content": "mail.acme-demo.test",
            "priority": 10,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_ok(json!({
            "id": "rec-mx",
            "type": "MX",
            "name": "acme-demo.test",
            "content": "mail.acme-demo.test",
            "priority": 10,
            "ttl": 3600,
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = cloudflare(&server, 0);
    let spf = publisher
        .create_spf_record("zone-1", "acme-demo.test", Ipv4Addr::new(203, 0, 113, 10))
        .await
        .unwrap();
    assert_eq!(spf.id, "rec-spf");
    assert_eq!(spf.record_type, DnsRecordType::Txt);

    let mx = publisher
        .create_mx_record("zone-1", "acme-demo.test", "mail.acme-demo.test", 10)
        .await
        .unwrap();
    assert_eq!(mx.priority, Some(10));
    assert_eq!(mx.zone_id, "zone-1");
}

#[tokio::test]
async fn duplicate_record_maps_to_record_exists() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/zones/zone-1/dns_records"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(cf_err(81057, "The record already exists.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = cloudflare(&server, 5)
        .create_dmarc_record("zone-1", "acme-demo.test", DmarcPolicy::None, "dmarc@ops.test")
        .await
        .unwrap_err();

    match err {
        ProviderError::RecordExists { record_name, .. } => {
            assert_eq!(record_name, "_dmarc.acme-demo.test");
        }
        other => panic!("expected RecordExists, got {other:?}"),
    }
}

#[tokio::test]
async fn permanent_rejection_carries_status_and_message_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/zones/zone-1/dns_records"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(cf_err(1020, "Unsupported content")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = cloudflare(&server, 5)
        .create_record(
            "zone-1",
            &RecordSpec::a("acme-demo.test", Ipv4Addr::new(203, 0, 113, 10)),
        )
        .await
        .unwrap_err();

    match err {
        ProviderError::Upstream {
            status,
            raw_message,
            ..
        } => {
            assert_eq!(status, Some(400));
            assert_eq!(raw_message, "Unsupported content");
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_ok(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let zone = cloudflare(&server, 5)
        .find_zone("acme-demo.test")
        .await
        .unwrap();
    assert!(zone.is_none());
}

#[tokio::test]
async fn rate_limit_exhaustion_is_distinct_from_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .expect(4)
        .mount(&server)
        .await;

    let err = cloudflare(&server, 3)
        .find_zone("acme-demo.test")
        .await
        .unwrap_err();

    match err {
        ProviderError::RetriesExhausted {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*last_error, ProviderError::RateLimited { .. }));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn find_records_filters_type_and_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones/zone-1/dns_records"))
        .and(query_param("type", "TXT"))
        .and(query_param("name", "mail2025._domainkey.acme-demo.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_ok(json!([
            cf_record("rec-dkim", "TXT", "mail2025._domainkey.acme-demo.test", "v=DKIM1; k=rsa; p=AAA"),
        ]))))
        .mount(&server)
        .await;

    let records = cloudflare(&server, 0)
        .find_records(
            "zone-1",
            "mail2025._domainkey.acme-demo.test",
            DnsRecordType::Txt,
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert!(records[0].content.starts_with("v=DKIM1; k=rsa; p="));
}

#[tokio::test]
async fn update_and_delete_record() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/zones/zone-1/dns_records/rec-dmarc"))
        .and(body_partial_json(json!({
            "content": "v=DMARC1; p=quarantine; rua=mailto:dmarc@ops.test",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_ok(cf_record(
            "rec-dmarc",
            "TXT",
            "_dmarc.acme-demo.test",
            "v=DMARC1; p=quarantine; rua=mailto:dmarc@ops.test",
        ))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/zones/zone-1/dns_records/rec-dmarc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_ok(json!({ "id": "rec-dmarc" }))))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = cloudflare(&server, 0);
    let spec = RecordSpec::dmarc("acme-demo.test", DmarcPolicy::Quarantine, "dmarc@ops.test");
    let updated = publisher
        .update_record("zone-1", "rec-dmarc", &spec)
        .await
        .unwrap();
    assert!(updated.content.contains("p=quarantine"));

    publisher.delete_record("zone-1", "rec-dmarc").await.unwrap();
}

#[tokio::test]
async fn cancelled_token_stops_the_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let err = cloudflare_with_token(&server, 5, token)
        .find_zone("acme-demo.test")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Cancelled { .. }));
}
