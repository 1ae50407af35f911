//! KumoMTA relay client against a mock admin endpoint

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

mod common;

use common::kumo;
use domain_activator_provider::{ProviderError, RelayAuthorizer, RelayCredential};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn authorize_posts_credentials_with_basic_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/admin/relay/acme-demo.test/credentials"))
        .and(basic_auth("admin", "relay-pw"))
        .and(body_json(json!({
            "credentials": [
                { "username": "sales", "password_hash": "hash-1" },
                { "username": "ops", "password_hash": "hash-2" },
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "added": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    let ok = kumo(&server)
        .authorize(
            "acme-demo.test",
            &[
                RelayCredential::new("sales", "hash-1"),
                RelayCredential::new("ops", "hash-2"),
            ],
        )
        .await
        .unwrap();
    assert!(ok);
}

#[tokio::test]
async fn reauthorizing_an_existing_pair_is_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/admin/relay/acme-demo.test/credentials"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "error": "exists" })))
        .mount(&server)
        .await;

    let ok = kumo(&server)
        .authorize("acme-demo.test", &[RelayCredential::new("sales", "hash-1")])
        .await
        .unwrap();
    assert!(ok);
}

#[tokio::test]
async fn removing_a_missing_inbox_is_success() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/admin/relay/acme-demo.test/credentials/sales"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    assert!(
        kumo(&server)
            .deauthorize("acme-demo.test", "sales")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn revoke_and_reload() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/admin/relay/acme-demo.test"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/admin/reload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = kumo(&server);
    assert!(client.revoke_domain("acme-demo.test").await.unwrap());
    assert!(client.reload_config().await.unwrap());
}

#[tokio::test]
async fn status_reports_inboxes_and_missing_domains() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/admin/relay/acme-demo.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "domain": "acme-demo.test",
            "status": "active",
            "inboxes": ["sales", "ops"],
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/admin/relay/unknown.test"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = kumo(&server);
    let status = client.status("acme-demo.test").await.unwrap();
    assert!(status.authorized);
    assert_eq!(status.usernames, vec!["sales", "ops"]);

    let missing = client.status("unknown.test").await.unwrap();
    assert!(!missing.authorized);
}

#[tokio::test]
async fn bad_admin_credentials_are_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/admin/reload"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "unauthorized" })))
        .mount(&server)
        .await;

    let err = kumo(&server).reload_config().await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidCredentials { .. }));
}

#[tokio::test]
async fn relay_unavailable_surfaces_without_internal_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/admin/relay/acme-demo.test/credentials"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = kumo(&server)
        .authorize("acme-demo.test", &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::RetriesExhausted { attempts: 1, .. }
    ));
}
