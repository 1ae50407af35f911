//! DKIM key generation and storage

use chrono::Utc;

use crate::crypto;
use crate::error::{CoreError, CoreResult};
use crate::services::PipelineContext;
use crate::types::{DkimKey, DKIM_ALGORITHM};

/// The active key for `(domain_id, selector)`, generating and storing one if absent.
pub(crate) async fn ensure_active_key(
    ctx: &PipelineContext,
    domain_id: &str,
    selector: &str,
) -> CoreResult<DkimKey> {
    if let Some(key) = ctx
        .dkim_key_repository
        .find_active(domain_id, selector)
        .await?
    {
        log::debug!("[lifecycle] {domain_id}: reusing DKIM key {} ({selector})", key.id);
        return Ok(key);
    }

    let key = generate_key(ctx, domain_id, selector).await?;
    ctx.dkim_key_repository.save(&key).await?;
    Ok(key)
}

/// Generate and seal a fresh key. Not persisted.
///
/// RSA generation and PBKDF2 both run on the blocking pool. The plaintext private key
/// never leaves that closure.
pub(crate) async fn generate_key(
    ctx: &PipelineContext,
    domain_id: &str,
    selector: &str,
) -> CoreResult<DkimKey> {
    let generator = ctx.key_generator.clone();
    let key_size = ctx.settings.dkim_key_size;
    let password = ctx.settings.key_encryption_key.clone();
    let iterations = ctx.settings.key_encryption_iterations;

    let (pair_value, fingerprint, key_size, sealed) = tokio::task::spawn_blocking(move || {
        let pair = generator.generate(key_size)?;
        let sealed =
            crypto::seal_with_iterations(pair.private_key.as_bytes(), &password, iterations)?;
        Ok::<_, CoreError>((
            pair.public_record_value,
            pair.fingerprint,
            pair.key_size,
            sealed,
        ))
    })
    .await
    .map_err(|e| CoreError::KeyGeneration(format!("key generation task failed: {e}")))??;

    log::info!(
        "[lifecycle] {domain_id}: generated {key_size}-bit DKIM key for selector {selector} ({})",
        &fingerprint[..fingerprint.len().min(16)]
    );

    Ok(DkimKey {
        id: uuid::Uuid::new_v4().to_string(),
        domain_id: domain_id.to_string(),
        selector: selector.to_string(),
        algorithm: DKIM_ALGORITHM.to_string(),
        key_size,
        public_record_value: pair_value,
        fingerprint,
        private_key: sealed,
        active: true,
        created_at: Utc::now(),
        rotated_at: None,
        expires_at: None,
    })
}
