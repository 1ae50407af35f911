use serde::{Deserialize, Serialize};

/// The three resolver outcomes the pipeline distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxtLookup {
    /// TXT answers, each with its character-strings concatenated.
    Records(Vec<String>),
    /// The name exists (or may yet exist) but carries no TXT data.
    NoRecords,
    /// Authoritative "domain does not exist".
    NxDomain,
}

/// How a propagation wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationOutcome {
    /// A matching TXT answer was observed.
    Visible,
    /// The deadline passed without a match.
    TimedOut,
    /// The resolver reported NXDOMAIN; polling stopped early.
    NxDomain,
    /// The caller's cancellation token fired.
    Cancelled,
}

impl PropagationOutcome {
    pub fn is_visible(self) -> bool {
        matches!(self, Self::Visible)
    }
}
