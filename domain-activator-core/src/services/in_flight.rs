//! In-process claim guard: at most one run per domain

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};

/// Registry of running pipeline runs, keyed by domain id.
#[derive(Debug, Default)]
pub struct InFlightRuns {
    runs: Mutex<HashMap<String, CancellationToken>>,
}

impl InFlightRuns {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        // entries stay consistent even if a holder panicked
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `domain_id` for one run. The claim's token is a child of `parent`.
    pub fn claim(self: &Arc<Self>, domain_id: &str, parent: &CancellationToken) -> CoreResult<RunClaim> {
        let mut runs = self.runs();
        if runs.contains_key(domain_id) {
            return Err(CoreError::PipelineBusy(domain_id.to_string()));
        }
        let token = parent.child_token();
        runs.insert(domain_id.to_string(), token.clone());
        Ok(RunClaim {
            runs: Arc::clone(self),
            domain_id: domain_id.to_string(),
            token,
        })
    }

    /// Cancel the run holding `domain_id`, if any.
    pub fn cancel(&self, domain_id: &str) -> bool {
        match self.runs().get(domain_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, domain_id: &str) -> bool {
        self.runs().contains_key(domain_id)
    }
}

/// Held for the duration of a run; releases the domain on drop.
#[derive(Debug)]
pub struct RunClaim {
    runs: Arc<InFlightRuns>,
    domain_id: String,
    token: CancellationToken,
}

impl RunClaim {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        self.runs.runs().remove(&self.domain_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_busy_until_release() {
        let runs = Arc::new(InFlightRuns::new());
        let root = CancellationToken::new();

        let claim = runs.claim("d1", &root).unwrap();
        assert!(matches!(runs.claim("d1", &root), Err(CoreError::PipelineBusy(_))));
        assert!(runs.claim("d2", &root).is_ok());

        drop(claim);
        assert!(!runs.is_running("d1"));
        assert!(runs.claim("d1", &root).is_ok());
    }

    #[test]
    fn cancel_reaches_the_claim_token() {
        let runs = Arc::new(InFlightRuns::new());
        let claim = runs.claim("d1", &CancellationToken::new()).unwrap();

        assert!(runs.cancel("d1"));
        assert!(claim.token().is_cancelled());
        assert!(!runs.cancel("other"));
    }

    #[test]
    fn shutdown_cancels_every_claim() {
        let runs = Arc::new(InFlightRuns::new());
        let root = CancellationToken::new();
        let a = runs.claim("a", &root).unwrap();
        let b = runs.claim("b", &root).unwrap();

        root.cancel();
        assert!(a.token().is_cancelled());
        assert!(b.token().is_cancelled());
    }
}
