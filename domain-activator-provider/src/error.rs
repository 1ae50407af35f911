use serde::{Deserialize, Serialize};

/// Unified error type for every upstream call (DNS provider and mail relay).
///
/// Each variant carries the `provider` that produced it. Errors fall into three
/// groups that callers are expected to treat differently:
///
/// - **Transient** ([`NetworkError`](Self::NetworkError), [`Timeout`](Self::Timeout),
///   [`RateLimited`](Self::RateLimited)): retried by the transport, never surfaced
///   directly once a retry budget is configured.
/// - **Exhausted** ([`RetriesExhausted`](Self::RetriesExhausted)): the upstream stayed
///   unreachable for the whole retry budget.
/// - **Rejected**: every other variant. The upstream answered and refused the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum ProviderError {
    /// Connection failure or a 502/503/504 gateway response.
    NetworkError {
        /// Upstream that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// The API token or relay credentials were refused.
    InvalidCredentials {
        /// Upstream that produced the error.
        provider: String,
        /// Original error message from the upstream API, if available.
        raw_message: Option<String>,
    },

    /// A record with the same natural key already exists.
    RecordExists {
        /// Upstream that produced the error.
        provider: String,
        /// Name of the conflicting record.
        record_name: String,
        /// Original error message from the upstream API, if available.
        raw_message: Option<String>,
    },

    /// The referenced record does not exist.
    RecordNotFound {
        /// Upstream that produced the error.
        provider: String,
        /// ID of the record that was not found.
        record_id: String,
        /// Original error message from the upstream API, if available.
        raw_message: Option<String>,
    },

    /// A request parameter was rejected (bad TTL, malformed content, ...).
    InvalidParameter {
        /// Upstream that produced the error.
        provider: String,
        /// Name of the invalid parameter.
        param: String,
        /// Description of what's wrong.
        detail: String,
    },

    /// The account's record or zone quota is exhausted.
    QuotaExceeded {
        /// Upstream that produced the error.
        provider: String,
        /// Original error message from the upstream API, if available.
        raw_message: Option<String>,
    },

    /// HTTP 429.
    RateLimited {
        /// Upstream that produced the error.
        provider: String,
        /// `Retry-After` header value in seconds, if the upstream sent one.
        retry_after: Option<u64>,
        /// Original error message from the upstream API, if available.
        raw_message: Option<String>,
    },

    /// The request exceeded the transport timeout.
    Timeout {
        /// Upstream that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// The zone (or relay domain) does not exist upstream.
    DomainNotFound {
        /// Upstream that produced the error.
        provider: String,
        /// Domain name or zone ID that was not found.
        domain: String,
        /// Original error message from the upstream API, if available.
        raw_message: Option<String>,
    },

    /// The credentials are valid but lack the required permission.
    PermissionDenied {
        /// Upstream that produced the error.
        provider: String,
        /// Original error message from the upstream API, if available.
        raw_message: Option<String>,
    },

    /// The upstream answered with a body we could not decode.
    ParseError {
        /// Upstream that produced the error.
        provider: String,
        /// Details about the parse failure.
        detail: String,
    },

    /// A request body could not be serialized.
    SerializationError {
        /// Upstream that produced the error.
        provider: String,
        /// Details about the serialization failure.
        detail: String,
    },

    /// A non-transient error response that has no dedicated variant.
    Upstream {
        /// Upstream that produced the error.
        provider: String,
        /// HTTP status of the response.
        status: Option<u16>,
        /// Upstream error code, if the body carried one.
        raw_code: Option<String>,
        /// Upstream error message (`errors[0].message` for Cloudflare).
        raw_message: String,
    },

    /// Every attempt failed with a transient error.
    RetriesExhausted {
        /// Upstream that produced the error.
        provider: String,
        /// Total number of attempts made (initial request plus retries).
        attempts: u32,
        /// The transient error returned by the final attempt.
        last_error: Box<ProviderError>,
    },

    /// The call was abandoned because the shutdown token fired.
    Cancelled {
        /// Upstream that produced the error.
        provider: String,
    },
}

impl ProviderError {
    /// Whether the error is caused by input or upstream state rather than a fault,
    /// used to pick the log level (`warn` when `true`, `error` otherwise).
    ///
    /// **Update this method when adding variants.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. }
                | Self::RecordExists { .. }
                | Self::RecordNotFound { .. }
                | Self::InvalidParameter { .. }
                | Self::QuotaExceeded { .. }
                | Self::DomainNotFound { .. }
                | Self::PermissionDenied { .. }
                | Self::Cancelled { .. }
        )
    }

    /// Whether the failure is worth retrying with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Name of the upstream that produced the error.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::NetworkError { provider, .. }
            | Self::InvalidCredentials { provider, .. }
            | Self::RecordExists { provider, .. }
            | Self::RecordNotFound { provider, .. }
            | Self::InvalidParameter { provider, .. }
            | Self::QuotaExceeded { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::DomainNotFound { provider, .. }
            | Self::PermissionDenied { provider, .. }
            | Self::ParseError { provider, .. }
            | Self::SerializationError { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::RetriesExhausted { provider, .. }
            | Self::Cancelled { provider } => provider,
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError { provider, detail } => {
                write!(f, "[{provider}] Network error: {detail}")
            }
            Self::InvalidCredentials {
                provider,
                raw_message,
            } => match raw_message {
                Some(msg) => write!(f, "[{provider}] Invalid credentials: {msg}"),
                None => write!(f, "[{provider}] Invalid credentials"),
            },
            Self::RecordExists {
                provider,
                record_name,
                ..
            } => write!(f, "[{provider}] Record '{record_name}' already exists"),
            Self::RecordNotFound {
                provider,
                record_id,
                ..
            } => write!(f, "[{provider}] Record '{record_id}' not found"),
            Self::InvalidParameter {
                provider,
                param,
                detail,
            } => write!(f, "[{provider}] Invalid parameter '{param}': {detail}"),
            Self::QuotaExceeded { provider, .. } => write!(f, "[{provider}] Quota exceeded"),
            Self::RateLimited {
                provider,
                retry_after,
                ..
            } => match retry_after {
                Some(secs) => write!(f, "[{provider}] Rate limited (retry after {secs}s)"),
                None => write!(f, "[{provider}] Rate limited"),
            },
            Self::Timeout { provider, detail } => {
                write!(f, "[{provider}] Request timeout: {detail}")
            }
            Self::DomainNotFound {
                provider,
                domain,
                raw_message,
            } => match raw_message {
                Some(msg) => write!(f, "[{provider}] Domain '{domain}' not found: {msg}"),
                None => write!(f, "[{provider}] Domain '{domain}' not found"),
            },
            Self::PermissionDenied {
                provider,
                raw_message,
            } => match raw_message {
                Some(msg) => write!(f, "[{provider}] Permission denied: {msg}"),
                None => write!(f, "[{provider}] Permission denied"),
            },
            Self::ParseError { provider, detail } => {
                write!(f, "[{provider}] Parse error: {detail}")
            }
            Self::SerializationError { provider, detail } => {
                write!(f, "[{provider}] Serialization error: {detail}")
            }
            Self::Upstream {
                provider,
                status,
                raw_message,
                ..
            } => match status {
                Some(code) => write!(f, "[{provider}] HTTP {code}: {raw_message}"),
                None => write!(f, "[{provider}] {raw_message}"),
            },
            Self::RetriesExhausted {
                provider,
                attempts,
                last_error,
            } => write!(
                f,
                "[{provider}] Retries exhausted after {attempts} attempts: {last_error}"
            ),
            Self::Cancelled { provider } => write!(f, "[{provider}] Request cancelled"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Convenience type alias for `Result<T, ProviderError>`.
pub type Result<T> = std::result::Result<T, ProviderError>;
