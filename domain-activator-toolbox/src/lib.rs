//! Public DNS side of the domain activation pipeline.
//!
//! [`PropagationVerifier`] polls resolvers until a published SPF or DKIM record is
//! observably live, the deadline passes, or the caller cancels. The resolver sits behind
//! [`TxtResolver`] so tests can script its answers.

mod error;
mod services;
mod types;

pub use error::{ToolboxError, ToolboxResult};
pub use services::propagation::{HickoryTxtResolver, PropagationVerifier, TxtResolver};
pub use services::validate_domain;
pub use types::{PropagationOutcome, TxtLookup};
