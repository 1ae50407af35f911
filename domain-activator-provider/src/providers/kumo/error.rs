//! KumoMTA error mapping

use crate::error::ProviderError;
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};

use super::{KumoRelayClient, PROVIDER_NAME};

/// The admin endpoint signals failures through HTTP status; `code` is informational.
impl ProviderErrorMapper for KumoRelayClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError {
        match raw.status {
            Some(401) => ProviderError::InvalidCredentials {
                provider: self.provider_name().to_string(),
                raw_message: Some(raw.message),
            },
            Some(403) => ProviderError::PermissionDenied {
                provider: self.provider_name().to_string(),
                raw_message: Some(raw.message),
            },
            Some(404) => ProviderError::DomainNotFound {
                provider: self.provider_name().to_string(),
                domain: context.domain.unwrap_or_else(|| "<unknown>".to_string()),
                raw_message: Some(raw.message),
            },
            Some(400 | 422) => ProviderError::InvalidParameter {
                provider: self.provider_name().to_string(),
                param: raw.code.unwrap_or_else(|| "credentials".to_string()),
                detail: raw.message,
            },
            _ => self.upstream_error(raw),
        }
    }
}
