//! Shared helpers for the mock-server tests

#![allow(dead_code)]

use std::time::Duration;

use domain_activator_provider::{
    CloudflarePublisher, KumoRelayClient, RetryPolicy, TransportConfig,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

/// Short backoff so retry tests finish quickly against a real socket.
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(10),
    }
}

pub fn transport() -> TransportConfig {
    TransportConfig {
        connect_timeout_secs: 2,
        request_timeout_secs: 5,
        ..TransportConfig::default()
    }
}

pub fn cloudflare(server: &MockServer, max_retries: u32) -> CloudflarePublisher {
    cloudflare_with_token(server, max_retries, CancellationToken::new())
}

pub fn cloudflare_with_token(
    server: &MockServer,
    max_retries: u32,
    shutdown: CancellationToken,
) -> CloudflarePublisher {
    CloudflarePublisher::builder("cf-test-token".to_string())
        .auth_email("ops@acme-demo.test")
        .api_base(server.uri())
        .transport_config(transport())
        .retry_policy(fast_retry(max_retries))
        .shutdown_token(shutdown)
        .build()
        .expect("publisher builds")
}

pub fn kumo(server: &MockServer) -> KumoRelayClient {
    KumoRelayClient::builder("unused.test", 443, "admin".into(), "relay-pw".into())
        .base_url(server.uri())
        .transport_config(transport())
        .build()
        .expect("relay client builds")
}

/// Cloudflare v4 success envelope.
pub fn cf_ok(result: Value) -> Value {
    json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
    })
}

/// Cloudflare v4 failure envelope.
pub fn cf_err(code: i32, message: &str) -> Value {
    json!({
        "success": false,
        "errors": [{ "code": code, "message": message }],
        "messages": [],
        "result": null,
    })
}

pub fn cf_record(id: &str, record_type: &str, name: &str, content: &str) -> Value {
    json!({
        "id": id,
        "zone_id": "zone-1",
        "type": record_type,
        "name": name,
        "content": content,
        "ttl": 3600,
        "proxied": false,
    })
}
