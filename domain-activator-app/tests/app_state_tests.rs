#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for `AppStateBuilder` and `AppState` wiring.

use std::sync::Arc;

use chrono::{Duration, Utc};

use domain_activator_app::adapters::SqliteStore;
use domain_activator_app::{AppConfig, AppState, AppStateBuilder};
use domain_activator_core::error::CoreError;
use domain_activator_core::traits::DomainRepository;
use domain_activator_core::types::{DomainStatus, RegistrationRecord};

const CONFIG: &str = r#"
[cloudflare]
api_token = "cf-token-0123456789"
account_id = "acc-1"

[relay]
host = "relay.internal"
username = "admin"
password = "relay-secret-42"

[pipeline]
server_ip = "203.0.113.10"
mail_host = "mail.acme-demo.test"
dmarc_report_email = "dmarc@acme-demo.test"
nameservers = ["127.0.0.1"]

[storage]
encryption_key = "master-key"
"#;

fn test_config(db: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::from_toml_str(CONFIG).expect("sample config parses");
    config.storage.database_path = db.to_path_buf();
    config.validate().expect("sample config is valid");
    config
}

async fn create_test_sqlite_store() -> (Arc<SqliteStore>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = tmp.path().join("test.db");
    let store = SqliteStore::new(&db_path)
        .await
        .expect("failed to create SqliteStore");
    (Arc::new(store), tmp)
}

fn registration(domain: &str) -> RegistrationRecord {
    RegistrationRecord {
        domain: domain.to_string(),
        registrar: "namecheap".to_string(),
        registration_id: "reg-1".to_string(),
        price_cents: 1099,
        purchased_at: Utc::now(),
        expires_at: Utc::now() + Duration::days(365),
        auto_renew: true,
    }
}

// ===== Builder validation =====

#[tokio::test]
async fn build_without_repositories_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let result = AppStateBuilder::new(test_config(&tmp.path().join("x.db"))).build();

    match result {
        Err(CoreError::ValidationError(msg)) => assert!(msg.contains("domain_repository")),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("build should fail without repositories"),
    }
}

#[tokio::test]
async fn build_reports_the_first_missing_repository() {
    let (store, tmp) = create_test_sqlite_store().await;
    let result = AppStateBuilder::new(test_config(&tmp.path().join("x.db")))
        .domain_repository(store.clone())
        .dkim_key_repository(store)
        .build();

    match result {
        Err(CoreError::ValidationError(msg)) => assert!(msg.contains("inbox_repository")),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("build should fail without the inbox repository"),
    }
}

#[tokio::test]
async fn build_rejects_an_unusable_server_ip() {
    let (store, tmp) = create_test_sqlite_store().await;
    let mut config = test_config(&tmp.path().join("x.db"));
    config.pipeline.server_ip = "mail.example.net".to_string();

    let result = AppStateBuilder::new(config).sqlite_store(store).build();
    assert!(matches!(result, Err(CoreError::ValidationError(_))));
}

// ===== Wiring =====

#[tokio::test]
async fn built_state_registers_purchases_in_sqlite() {
    let (store, tmp) = create_test_sqlite_store().await;
    let state = AppStateBuilder::new(test_config(&tmp.path().join("x.db")))
        .sqlite_store(store.clone())
        .build()
        .unwrap();

    let domain = state
        .coordinator
        .register_purchase("tenant-1", registration("acme-demo.test"))
        .await
        .unwrap();
    assert_eq!(domain.status, DomainStatus::PendingDns);

    let stored = store
        .find_by_name("tenant-1", "acme-demo.test")
        .await
        .unwrap()
        .expect("domain persisted");
    assert_eq!(stored.id, domain.id);
    assert_eq!(stored.registrar.as_deref(), Some("namecheap"));
    assert_eq!(stored.dkim_selector, "mail2025");
}

#[tokio::test]
async fn open_creates_the_database_file() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("state").join("pipeline.db");
    let state = AppState::open(test_config(&db)).await.unwrap();

    assert!(db.exists());
    assert_eq!(state.config.relay.port, 8000);
}

#[tokio::test]
async fn shutdown_cancels_the_shared_token() {
    let (store, tmp) = create_test_sqlite_store().await;
    let token = tokio_util::sync::CancellationToken::new();
    let state = AppStateBuilder::new(test_config(&tmp.path().join("x.db")))
        .sqlite_store(store)
        .shutdown_token(token.clone())
        .build()
        .unwrap();

    assert!(!token.is_cancelled());
    state.shutdown();
    assert!(token.is_cancelled());
    assert!(state.shutdown_token().is_cancelled());
}
