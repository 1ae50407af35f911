//! Relay calls with the coordinator's small fixed retry budget

use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use domain_activator_provider::{ProviderError, RelayCredential};

use crate::error::{CoreError, CoreResult};
use crate::services::PipelineContext;

#[derive(Debug, Clone, Copy)]
enum RelayAction {
    Authorize,
    Revoke,
    Deauthorize,
}

impl fmt::Display for RelayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authorize => "authorize",
            Self::Revoke => "revoke",
            Self::Deauthorize => "deauthorize",
        })
    }
}

/// Run `op` up to `relay_attempts` times, pausing `relay_retry_delay` in between.
///
/// When the relay is configured to require it, `reload_config` is part of each attempt,
/// so a change only counts once the reload succeeded too.
async fn with_attempts<F, Fut>(
    ctx: &PipelineContext,
    action: RelayAction,
    domain: &str,
    cancel: &CancellationToken,
    mut op: F,
) -> CoreResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ProviderError>>,
{
    let attempts = ctx.settings.relay_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled {
                provider: ctx.relay.id().to_string(),
            }
            .into());
        }

        let result = match op().await {
            Ok(true) if ctx.settings.relay_requires_reload => ctx.relay.reload_config().await,
            other => other,
        };

        match result {
            Ok(true) => return Ok(()),
            Ok(false) => last_error = "relay reported no change".to_string(),
            Err(e @ ProviderError::Cancelled { .. }) => return Err(e.into()),
            Err(e) => {
                if e.is_expected() {
                    log::warn!("[lifecycle] {domain}: relay {action} attempt {attempt}/{attempts} failed: {e}");
                } else {
                    log::error!("[lifecycle] {domain}: relay {action} attempt {attempt}/{attempts} failed: {e}");
                }
                last_error = e.to_string();
            }
        }

        if attempt < attempts {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(ctx.settings.relay_retry_delay) => {}
            }
        }
    }

    let domain = domain.to_string();
    Err(match action {
        RelayAction::Authorize => CoreError::RelayAuthorization {
            domain,
            detail: last_error,
        },
        RelayAction::Revoke | RelayAction::Deauthorize => CoreError::RelayDeauthorization {
            domain,
            action: action.to_string(),
            detail: last_error,
        },
    })
}

/// Push the domain and its inbox credentials into the accept list.
pub(crate) async fn authorize(
    ctx: &PipelineContext,
    domain: &str,
    credentials: &[RelayCredential],
    cancel: &CancellationToken,
) -> CoreResult<()> {
    with_attempts(ctx, RelayAction::Authorize, domain, cancel, || {
        ctx.relay.authorize(domain, credentials)
    })
    .await
}

/// Take the whole domain out of the accept list.
pub(crate) async fn revoke(
    ctx: &PipelineContext,
    domain: &str,
    cancel: &CancellationToken,
) -> CoreResult<()> {
    with_attempts(ctx, RelayAction::Revoke, domain, cancel, || ctx.relay.revoke_domain(domain)).await
}

/// Remove a single inbox.
pub(crate) async fn deauthorize(
    ctx: &PipelineContext,
    domain: &str,
    username: &str,
    cancel: &CancellationToken,
) -> CoreResult<()> {
    with_attempts(ctx, RelayAction::Deauthorize, domain, cancel, || {
        ctx.relay.deauthorize(domain, username)
    })
    .await
}
