//! Command-line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use domain_activator_core::types::DmarcPolicy;

/// Operate the domain activation pipeline
#[derive(Parser, Debug)]
#[command(name = "domain-activator")]
#[command(about = "Provision sending domains: DNS, DKIM and relay authorization", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file; environment variables override it
    #[arg(short, long, env = "DOMAIN_ACTIVATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a completed purchase; the domain starts in pending_dns
    Register {
        /// Registered domain name
        domain: String,

        #[arg(long, default_value = "default")]
        tenant: String,

        #[arg(long)]
        registrar: String,

        #[arg(long)]
        registration_id: String,

        #[arg(long, default_value_t = 0)]
        price_cents: i64,

        /// Days until the registration expires
        #[arg(long, default_value_t = 365)]
        expires_in_days: i64,

        #[arg(long)]
        auto_renew: bool,
    },
    /// List a tenant's domains
    List {
        #[arg(long, default_value = "default")]
        tenant: String,
    },
    /// Run the activation pipeline (zone, records, propagation, relay)
    Activate { domain_id: String },
    /// Take a domain out of service
    Suspend {
        domain_id: String,

        #[arg(long, default_value = "operator request")]
        reason: String,
    },
    /// Bring a suspended domain back
    Reactivate { domain_id: String },
    /// Reset a failed domain to pending_dns
    Retry { domain_id: String },
    /// Mark a domain expired and revoke its relay access
    Expire { domain_id: String },
    /// Show the health summary for a domain
    Health { domain_id: String },
    /// Update the published DMARC policy
    Dmarc {
        domain_id: String,

        /// none, quarantine or reject
        policy: DmarcPolicy,
    },
    /// Generate a new DKIM key under a fresh selector
    RotateDkim { domain_id: String, selector: String },
    /// Manage relay inbox credentials
    Inbox {
        #[command(subcommand)]
        action: InboxAction,
    },
    /// Tear down DNS, relay and stored state for a domain
    Delete { domain_id: String },
}

#[derive(Subcommand, Debug)]
pub enum InboxAction {
    /// Queue a credential for relay authorization
    Add {
        domain_id: String,
        username: String,
        /// Pre-hashed credential
        credential_hash: String,
    },
    /// Remove a credential from the relay and the store
    Remove { domain_id: String, username: String },
}
