//! Utility modules.

/// Log sanitization: bounded bodies and masked secrets.
pub mod log_sanitizer;
