//! Cloudflare error mapping

use crate::error::ProviderError;
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};

use super::{CloudflarePublisher, PROVIDER_NAME};

/// Cloudflare error code mapping
/// Reference: <https://api.cloudflare.com/#getting-started-responses>
impl ProviderErrorMapper for CloudflarePublisher {
    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError {
        match raw.code.as_deref() {
            // 6003: Invalid request headers
            // 6103: Invalid format for X-Auth-Key header
            // 6111: Invalid format for Authorization header
            // 9109: Unauthorized to access requested resource
            // 10000: Authentication error
            Some("6003" | "6103" | "6111" | "9109" | "10000") => {
                ProviderError::InvalidCredentials {
                    provider: self.provider_name().to_string(),
                    raw_message: Some(raw.message),
                }
            }

            // 1004: DNS Validation Error
            // 9000: Invalid or missing name
            // 9005: Content for A record is invalid
            // 9009: Content for MX record must be a hostname
            // 9021: Invalid TTL
            // 9041: This DNS record cannot be proxied
            Some(code @ ("1004" | "9000" | "9005" | "9009" | "9021" | "9041")) => {
                let param = match code {
                    "9000" => "name",
                    "9005" | "9009" => "content",
                    "9021" => "ttl",
                    "9041" => "proxied",
                    _ => "general",
                };
                ProviderError::InvalidParameter {
                    provider: self.provider_name().to_string(),
                    param: param.to_string(),
                    detail: raw.message,
                }
            }

            // 81053-81058: a record with that host/settings already exists
            // 1061: zone already exists
            Some("81053" | "81054" | "81055" | "81056" | "81057" | "81058" | "1061") => {
                ProviderError::RecordExists {
                    provider: self.provider_name().to_string(),
                    record_name: context
                        .record_name
                        .or(context.domain)
                        .unwrap_or_else(|| "<unknown>".to_string()),
                    raw_message: Some(raw.message),
                }
            }

            // 81044: Record does not exist
            Some("81044") => ProviderError::RecordNotFound {
                provider: self.provider_name().to_string(),
                record_id: context.record_id.unwrap_or_else(|| "<unknown>".to_string()),
                raw_message: Some(raw.message),
            },

            // 81045: The record quota has been exceeded
            Some("81045") => ProviderError::QuotaExceeded {
                provider: self.provider_name().to_string(),
                raw_message: Some(raw.message),
            },

            // 7000: No route for that URI
            // 7003: Could not route, object identifier is invalid
            Some("7000" | "7003") => ProviderError::DomainNotFound {
                provider: self.provider_name().to_string(),
                domain: context.domain.unwrap_or_else(|| "<unknown>".to_string()),
                raw_message: Some(raw.message),
            },

            // No recognised code: fall back on the HTTP status
            _ => match raw.status {
                Some(401) => ProviderError::InvalidCredentials {
                    provider: self.provider_name().to_string(),
                    raw_message: Some(raw.message),
                },
                Some(403) => ProviderError::PermissionDenied {
                    provider: self.provider_name().to_string(),
                    raw_message: Some(raw.message),
                },
                _ => self.upstream_error(raw),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn publisher() -> CloudflarePublisher {
        CloudflarePublisher::new(String::new()).unwrap()
    }

    #[test]
    fn auth_codes_map_to_invalid_credentials() {
        let p = publisher();
        for code in ["6003", "6103", "6111", "9109", "10000"] {
            let err = p.map_error(
                RawApiError::with_code(Some(400), code, "auth"),
                ErrorContext::default(),
            );
            assert!(
                matches!(err, ProviderError::InvalidCredentials { .. }),
                "code {code} mapped to {err:?}"
            );
        }
    }

    #[test]
    fn validation_codes_name_the_parameter() {
        let p = publisher();
        let err = p.map_error(
            RawApiError::with_code(Some(400), "9021", "Invalid TTL"),
            ErrorContext::default(),
        );
        assert!(matches!(
            err,
            ProviderError::InvalidParameter { ref param, .. } if param == "ttl"
        ));
    }

    #[test]
    fn duplicate_record_keeps_record_name() {
        let p = publisher();
        let err = p.map_error(
            RawApiError::with_code(Some(400), "81057", "The record already exists."),
            ErrorContext::record("_dmarc.acme-demo.test"),
        );
        assert!(matches!(
            err,
            ProviderError::RecordExists { ref record_name, .. } if record_name == "_dmarc.acme-demo.test"
        ));
    }

    #[test]
    fn duplicate_zone_uses_domain_context() {
        let p = publisher();
        let err = p.map_error(
            RawApiError::with_code(Some(400), "1061", "already exists"),
            ErrorContext::domain("acme-demo.test"),
        );
        assert!(matches!(
            err,
            ProviderError::RecordExists { ref record_name, .. } if record_name == "acme-demo.test"
        ));
    }

    #[test]
    fn missing_record_and_quota() {
        let p = publisher();
        let err = p.map_error(
            RawApiError::with_code(Some(404), "81044", "Record does not exist."),
            ErrorContext::record_id("rec-1"),
        );
        assert!(matches!(
            err,
            ProviderError::RecordNotFound { ref record_id, .. } if record_id == "rec-1"
        ));

        let err = p.map_error(
            RawApiError::with_code(Some(400), "81045", "quota"),
            ErrorContext::default(),
        );
        assert!(matches!(err, ProviderError::QuotaExceeded { .. }));
    }

    #[test]
    fn unknown_code_keeps_status_and_message() {
        let p = publisher();
        let err = p.map_error(
            RawApiError::with_code(Some(400), "99999", "something odd"),
            ErrorContext::default(),
        );
        match err {
            ProviderError::Upstream {
                status,
                raw_code,
                raw_message,
                ..
            } => {
                assert_eq!(status, Some(400));
                assert_eq!(raw_code.as_deref(), Some("99999"));
                assert_eq!(raw_message, "something odd");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn codeless_forbidden_is_permission_denied() {
        let p = publisher();
        let err = p.map_error(
            RawApiError::new(Some(403), "forbidden"),
            ErrorContext::default(),
        );
        assert!(matches!(err, ProviderError::PermissionDenied { .. }));
    }
}
