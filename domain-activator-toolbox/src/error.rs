//! Unified error type

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Toolbox error type
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code", content = "details")]
pub enum ToolboxError {
    /// Input rejected before any network call
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Resolver could not be reached or answered with an unexpected failure
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Toolbox Result alias
pub type ToolboxResult<T> = std::result::Result<T, ToolboxError>;
