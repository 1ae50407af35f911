//! Application configuration.
//!
//! Loaded from a TOML file, then overridden by environment variables, then validated.
//! Every field except the secrets has a default, so an empty file plus the secret
//! variables is a working configuration.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use domain_activator_core::crypto::dkim::{MAX_KEY_SIZE, MIN_KEY_SIZE};
use domain_activator_core::crypto::PBKDF2_ITERATIONS;
use domain_activator_core::PipelineSettings;
use domain_activator_provider::{redact_secret, TransportConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {detail}")]
    InvalidEnv { key: &'static str, detail: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudflareConfig {
    pub api_token: String,
    /// Sent as `X-Auth-Email`
    pub email: Option<String>,
    pub account_id: String,
    /// Override for tests and API gateways
    pub api_base: Option<String>,
}

impl fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("api_token", &redact_secret(&self.api_token))
            .field("email", &self.email)
            .field("account_id", &self.account_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Gate every accept-list change on a successful config reload
    pub require_reload: bool,
    pub attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            username: String::new(),
            password: String::new(),
            require_reload: false,
            attempts: 3,
            retry_delay_ms: 1_000,
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact_secret(&self.password))
            .field("require_reload", &self.require_reload)
            .field("attempts", &self.attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub server_ip: String,
    pub mail_host: String,
    pub mx_priority: u16,
    pub dmarc_report_email: String,
    pub dkim_selector: String,
    pub dkim_key_size: u32,
    pub propagation_timeout_secs: u64,
    pub propagation_interval_secs: u64,
    pub publish_a_record: bool,
    pub max_publish_attempts: u32,
    /// Resolvers used for propagation checks; empty means the system configuration
    pub nameservers: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let settings = PipelineSettings::default();
        Self {
            server_ip: String::new(),
            mail_host: String::new(),
            mx_priority: settings.mx_priority,
            dmarc_report_email: String::new(),
            dkim_selector: settings.dkim_selector,
            dkim_key_size: settings.dkim_key_size,
            propagation_timeout_secs: settings.propagation_timeout.as_secs(),
            propagation_interval_secs: settings.propagation_interval.as_secs(),
            publish_a_record: false,
            max_publish_attempts: settings.max_publish_attempts,
            nameservers: Vec::new(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    /// Master password sealing DKIM private keys
    pub encryption_key: String,
    pub kdf_iterations: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("domain-activator.db"),
            encryption_key: String::new(),
            kdf_iterations: PBKDF2_ITERATIONS,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("database_path", &self.database_path)
            .field("encryption_key", &redact_secret(&self.encryption_key))
            .field("kdf_iterations", &self.kdf_iterations)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cloudflare: CloudflareConfig,
    pub transport: TransportConfig,
    pub relay: RelayConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cloudflare: CloudflareConfig::default(),
            transport: TransportConfig::default(),
            relay: RelayConfig::default(),
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// File (if any), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides through `lookup`; unset variables leave the file
    /// value in place.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };

        set(&mut self.cloudflare.api_token, "CLOUDFLARE_API_TOKEN");
        set(&mut self.cloudflare.account_id, "CLOUDFLARE_ACCOUNT_ID");
        if let Some(email) = lookup("CLOUDFLARE_EMAIL") {
            self.cloudflare.email = Some(email);
        }
        set(&mut self.relay.host, "KUMO_HOST");
        set(&mut self.relay.username, "KUMO_USERNAME");
        set(&mut self.relay.password, "KUMO_PASSWORD");
        set(&mut self.storage.encryption_key, "DKIM_ENCRYPTION_KEY");
        set(&mut self.log_level, "LOG_LEVEL");

        if let Some(port) = lookup("KUMO_HTTPS_PORT") {
            self.relay.port = port.parse().map_err(|e| ConfigError::InvalidEnv {
                key: "KUMO_HTTPS_PORT",
                detail: format!("{port:?}: {e}"),
            })?;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("cloudflare.api_token", &self.cloudflare.api_token),
            ("cloudflare.account_id", &self.cloudflare.account_id),
            ("relay.username", &self.relay.username),
            ("relay.password", &self.relay.password),
            ("storage.encryption_key", &self.storage.encryption_key),
            ("pipeline.mail_host", &self.pipeline.mail_host),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("{name} is required")));
        }

        self.server_ip()?;
        self.nameservers()?;

        let email = &self.pipeline.dmarc_report_email;
        if email.split('@').filter(|part| !part.is_empty()).count() != 2 {
            return Err(ConfigError::Invalid(format!(
                "pipeline.dmarc_report_email {email:?} is not an email address"
            )));
        }
        if !(MIN_KEY_SIZE..=MAX_KEY_SIZE).contains(&self.pipeline.dkim_key_size) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.dkim_key_size must be between {MIN_KEY_SIZE} and {MAX_KEY_SIZE}"
            )));
        }
        if self.pipeline.propagation_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.propagation_interval_secs must be positive".to_string(),
            ));
        }
        if self.storage.kdf_iterations == 0 {
            return Err(ConfigError::Invalid(
                "storage.kdf_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_ip(&self) -> ConfigResult<Ipv4Addr> {
        self.pipeline.server_ip.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "pipeline.server_ip {:?} is not an IPv4 address",
                self.pipeline.server_ip
            ))
        })
    }

    pub fn nameservers(&self) -> ConfigResult<Vec<IpAddr>> {
        self.pipeline
            .nameservers
            .iter()
            .map(|ns| {
                ns.trim().parse().map_err(|_| {
                    ConfigError::Invalid(format!("pipeline.nameservers: {ns:?} is not an IP"))
                })
            })
            .collect()
    }

    /// Settings handed to the coordinator.
    pub fn pipeline_settings(&self) -> ConfigResult<PipelineSettings> {
        let pipeline = &self.pipeline;
        Ok(PipelineSettings {
            account_id: self.cloudflare.account_id.clone(),
            server_ip: self.server_ip()?,
            mail_host: pipeline.mail_host.trim_end_matches('.').to_string(),
            mx_priority: pipeline.mx_priority,
            dmarc_report_email: pipeline.dmarc_report_email.clone(),
            dkim_selector: pipeline.dkim_selector.clone(),
            dkim_key_size: pipeline.dkim_key_size,
            key_encryption_key: self.storage.encryption_key.clone(),
            key_encryption_iterations: self.storage.kdf_iterations,
            propagation_timeout: Duration::from_secs(pipeline.propagation_timeout_secs),
            propagation_interval: Duration::from_secs(pipeline.propagation_interval_secs),
            publish_a_record: pipeline.publish_a_record,
            max_publish_attempts: pipeline.max_publish_attempts,
            relay_attempts: self.relay.attempts,
            relay_retry_delay: Duration::from_millis(self.relay.retry_delay_ms),
            relay_requires_reload: self.relay.require_reload,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SAMPLE: &str = r#"
log_level = "debug"

[cloudflare]
api_token = "cf-token-0123456789"
account_id = "acc-1"

[relay]
host = "relay.internal"
port = 8443
username = "admin"
password = "relay-secret-42"
require_reload = true

[pipeline]
server_ip = "203.0.113.10"
mail_host = "mail.acme-demo.test."
dmarc_report_email = "dmarc@acme-demo.test"
nameservers = ["1.1.1.1", "8.8.8.8"]

[storage]
database_path = "/var/lib/domain-activator/state.db"
encryption_key = "master-key"
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_sample_with_defaults() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.relay.port, 8443);
        assert_eq!(config.relay.attempts, 3);
        assert_eq!(config.pipeline.mx_priority, 10);
        assert_eq!(config.pipeline.dkim_selector, "mail2025");
        assert_eq!(config.pipeline.dkim_key_size, 2048);
        assert_eq!(config.transport, TransportConfig::default());
        assert_eq!(config.nameservers().unwrap().len(), 2);
    }

    #[test]
    fn test_pipeline_settings() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        let settings = config.pipeline_settings().unwrap();

        assert_eq!(settings.server_ip, Ipv4Addr::new(203, 0, 113, 10));
        assert_eq!(settings.mail_host, "mail.acme-demo.test");
        assert_eq!(settings.account_id, "acc-1");
        assert!(settings.relay_requires_reload);
        assert_eq!(settings.propagation_timeout, Duration::from_secs(60));
        assert_eq!(settings.propagation_interval, Duration::from_secs(5));
        assert_eq!(settings.key_encryption_iterations, PBKDF2_ITERATIONS);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config
            .apply_env(env(&[
                ("CLOUDFLARE_API_TOKEN", "from-env-token"),
                ("CLOUDFLARE_EMAIL", "ops@acme-demo.test"),
                ("KUMO_HTTPS_PORT", "9443"),
                ("DATABASE_PATH", "/tmp/override.db"),
            ]))
            .unwrap();

        assert_eq!(config.cloudflare.api_token, "from-env-token");
        assert_eq!(config.cloudflare.email.as_deref(), Some("ops@acme-demo.test"));
        assert_eq!(config.relay.port, 9443);
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/override.db"));
        // untouched
        assert_eq!(config.relay.host, "relay.internal");
    }

    #[test]
    fn test_env_port_must_be_numeric() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("KUMO_HTTPS_PORT", "https")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "KUMO_HTTPS_PORT", .. }));
    }

    #[test]
    fn test_env_only_configuration() {
        let mut config = AppConfig::from_toml_str(
            "[pipeline]\nserver_ip = \"203.0.113.10\"\nmail_host = \"mail.acme-demo.test\"\ndmarc_report_email = \"d@acme-demo.test\"\n",
        )
        .unwrap();
        config
            .apply_env(env(&[
                ("CLOUDFLARE_API_TOKEN", "t"),
                ("CLOUDFLARE_ACCOUNT_ID", "a"),
                ("KUMO_USERNAME", "u"),
                ("KUMO_PASSWORD", "p"),
                ("DKIM_ENCRYPTION_KEY", "k"),
            ]))
            .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_secret_rejected() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.storage.encryption_key.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.encryption_key"));
    }

    #[test]
    fn test_malformed_values_rejected() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.pipeline.server_ip = "2001:db8::1".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.pipeline.nameservers = vec!["dns.example".to_string()];
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.pipeline.dmarc_report_email = "nobody".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.pipeline.dkim_key_size = 512;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_toml_is_a_parse_error() {
        let err = AppConfig::from_toml_str("relay = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("cf-token-0123456789"));
        assert!(!printed.contains("relay-secret-42"));
        assert!(!printed.contains("master-key"));
        assert!(printed.contains("relay.internal"));
    }
}
