//! Resolver-backed services.

pub mod propagation;
mod resolver;

use crate::error::{ToolboxError, ToolboxResult};

/// Validate and normalise a domain name.
///
/// Trims whitespace and a trailing dot, lowercases, and rejects empty or overlong
/// names, IP literals, and labels outside `[a-z0-9-]` (leading/trailing hyphen included).
pub fn validate_domain(domain: &str) -> ToolboxResult<String> {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return Err(ToolboxError::ValidationError(
            "Domain name is required".to_string(),
        ));
    }
    if domain.parse::<std::net::IpAddr>().is_ok() {
        return Err(ToolboxError::ValidationError(format!(
            "Expected a domain name, got an IP address: {domain}"
        )));
    }
    if domain.len() > 253 {
        return Err(ToolboxError::ValidationError(format!(
            "Domain name exceeds maximum length of 253 characters (got {})",
            domain.len()
        )));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(ToolboxError::ValidationError(format!(
            "Domain name needs at least two labels: {domain}"
        )));
    }
    for label in labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if !valid {
            return Err(ToolboxError::ValidationError(format!(
                "Invalid domain name: {domain}"
            )));
        }
    }
    Ok(domain)
}
