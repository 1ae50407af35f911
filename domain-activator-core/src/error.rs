//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

use domain_activator_provider::RecordPurpose;

// Re-export library error types
pub use domain_activator_provider::ProviderError;
pub use domain_activator_toolbox::ToolboxError;

use crate::types::{DomainStatus, FailureReason, RecordFailure};

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Domain not found
    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    /// The tenant already owns a domain with this name
    #[error("Domain already registered: {0}")]
    DomainExists(String),

    /// The lifecycle state machine does not allow this move
    #[error("Invalid transition for {domain}: {from} -> {to}")]
    InvalidTransition {
        domain: String,
        from: DomainStatus,
        to: DomainStatus,
    },

    /// Another run for the same domain holds the claim
    #[error("Activation already in progress for {0}")]
    PipelineBusy(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Key pair generation or encoding failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Some records were published, others were not
    #[error("DNS publishing incomplete: {} published, {} failed", published.len(), failed.len())]
    PublishIncomplete {
        published: Vec<RecordPurpose>,
        failed: Vec<RecordFailure>,
    },

    /// Public DNS answered NXDOMAIN for the domain
    #[error("Domain does not resolve: {0}")]
    DomainNotResolvable(String),

    /// The relay kept refusing the domain after every attempt
    #[error("Relay authorization failed for {domain}: {detail}")]
    RelayAuthorization { domain: String, detail: String },

    /// The relay kept refusing to drop the domain or one of its inboxes
    #[error("Relay {action} failed for {domain}: {detail}")]
    RelayDeauthorization {
        domain: String,
        action: String,
        detail: String,
    },

    /// Record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Upstream error (converted from the provider crate)
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Resolver error (converted from the toolbox crate)
    #[error("{0}")]
    Toolbox(#[from] ToolboxError),
}

impl CoreError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.), used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::DomainNotFound(_)
            | Self::DomainExists(_)
            | Self::InvalidTransition { .. }
            | Self::PipelineBusy(_)
            | Self::ValidationError(_)
            | Self::RecordNotFound(_)
            | Self::DomainNotResolvable(_) => true,
            Self::Provider(e) => e.is_expected(),
            _ => false,
        }
    }

    /// Reason persisted on the domain when this error stops a pipeline run.
    ///
    /// `None` for errors that say nothing about the domain itself (busy, not found,
    /// storage trouble).
    #[must_use]
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::KeyGeneration(_) => Some(FailureReason::KeyGenerationFailed),
            Self::PublishIncomplete { .. } => Some(FailureReason::DnsPublishIncomplete),
            Self::DomainNotResolvable(_) => Some(FailureReason::Nxdomain),
            Self::RelayAuthorization { .. } => Some(FailureReason::RelayAuthorizationFailed),
            Self::RelayDeauthorization { .. } => Some(FailureReason::RelayDeauthorizationFailed),
            Self::Provider(ProviderError::RetriesExhausted { .. }) => {
                Some(FailureReason::UpstreamUnavailable)
            }
            Self::Provider(ProviderError::Cancelled { .. }) => None,
            Self::Provider(ProviderError::InvalidCredentials { .. }) => {
                Some(FailureReason::ProviderCredentialsRejected)
            }
            Self::Provider(_) => Some(FailureReason::ProviderRejected),
            _ => None,
        }
    }

    /// Stable snake_case code shown to tenants instead of upstream text.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        if let Some(reason) = self.failure_reason() {
            return reason.as_str();
        }
        match self {
            Self::DomainNotFound(_) => "domain_not_found",
            Self::DomainExists(_) => "domain_exists",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::PipelineBusy(_) => "pipeline_busy",
            Self::ValidationError(_) | Self::Toolbox(ToolboxError::ValidationError(_)) => {
                "validation_error"
            }
            Self::RecordNotFound(_) => "record_not_found",
            Self::Provider(ProviderError::Cancelled { .. }) => "cancelled",
            _ => "internal_error",
        }
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
