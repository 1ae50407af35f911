//! Operator CLI for the domain activation pipeline.
//!
//! Every command prints its result as JSON on stdout; logs go to stderr.
//! Ctrl-C cancels in-flight runs through the shared shutdown token, so an
//! interrupted activation leaves the domain resumable.

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Parser;
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands, InboxAction};
use domain_activator_app::{AppConfig, AppState};
use domain_activator_core::traits::DomainRepository;
use domain_activator_core::types::{DomainStatus, RegistrationRecord, RelayCredential};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let json_layer = cli.log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!cli.log_json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    match run(cli.command, config).await {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("{}", json!({ "error": format!("{e:#}") }));
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_lines)]
async fn run(command: Commands, config: AppConfig) -> anyhow::Result<Value> {
    let state = AppState::open(config)
        .await
        .context("failed to open pipeline state")?;

    let shutdown = state.shutdown_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling in-flight work");
            shutdown.cancel();
        }
    });

    let coordinator = &state.coordinator;
    let output = match command {
        Commands::Register {
            domain,
            tenant,
            registrar,
            registration_id,
            price_cents,
            expires_in_days,
            auto_renew,
        } => {
            let purchased_at = Utc::now();
            let registration = RegistrationRecord {
                domain,
                registrar,
                registration_id,
                price_cents,
                purchased_at,
                expires_at: purchased_at + Duration::days(expires_in_days),
                auto_renew,
            };
            serde_json::to_value(coordinator.register_purchase(&tenant, registration).await?)?
        }
        Commands::List { tenant } => {
            let repo = &coordinator.context().domain_repository;
            let domains = DomainRepository::find_by_tenant(repo.as_ref(), &tenant).await?;
            serde_json::to_value(domains)?
        }
        Commands::Activate { domain_id } => {
            status(&domain_id, coordinator.activate_pipeline(&domain_id).await?)
        }
        Commands::Suspend { domain_id, reason } => {
            status(&domain_id, coordinator.suspend(&domain_id, &reason).await?)
        }
        Commands::Reactivate { domain_id } => {
            status(&domain_id, coordinator.reactivate(&domain_id).await?)
        }
        Commands::Retry { domain_id } => {
            status(&domain_id, coordinator.retry_failed(&domain_id).await?)
        }
        Commands::Expire { domain_id } => {
            status(&domain_id, coordinator.mark_expired(&domain_id).await?)
        }
        Commands::Health { domain_id } => {
            serde_json::to_value(coordinator.get_health(&domain_id).await?)?
        }
        Commands::Dmarc { domain_id, policy } => {
            let domain = coordinator.set_dmarc_policy(&domain_id, policy).await?;
            json!({ "domainId": domain.id, "dmarcPolicy": domain.dmarc_policy })
        }
        Commands::RotateDkim {
            domain_id,
            selector,
        } => {
            let key = coordinator.rotate_dkim_key(&domain_id, &selector).await?;
            json!({
                "domainId": key.domain_id,
                "selector": key.selector,
                "fingerprint": key.fingerprint,
                "publicRecord": key.public_record_value,
            })
        }
        Commands::Inbox { action } => match action {
            InboxAction::Add {
                domain_id,
                username,
                credential_hash,
            } => {
                let queued = coordinator
                    .queue_inbox_credentials(
                        &domain_id,
                        vec![RelayCredential::new(username, credential_hash)],
                    )
                    .await?;
                json!({ "domainId": domain_id, "queued": queued })
            }
            InboxAction::Remove {
                domain_id,
                username,
            } => {
                coordinator.remove_inbox(&domain_id, &username).await?;
                json!({ "domainId": domain_id, "removed": username })
            }
        },
        Commands::Delete { domain_id } => {
            coordinator.delete_domain(&domain_id).await?;
            json!({ "domainId": domain_id, "deleted": true })
        }
    };
    Ok(output)
}

fn status(domain_id: &str, status: DomainStatus) -> Value {
    json!({ "domainId": domain_id, "status": status })
}
