//! DKIM key material generation

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, SecretDocument};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_KEY_SIZE: u32 = 2048;
pub const MIN_KEY_SIZE: u32 = 1024;
pub const MAX_KEY_SIZE: u32 = 4096;

/// PKCS#8 DER private key. Zeroized on drop; never printed.
pub struct PrivateKeyMaterial(SecretDocument);

impl PrivateKeyMaterial {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyMaterial(<redacted>)")
    }
}

/// Output of [`KeyMaterialGenerator::generate`].
#[derive(Debug)]
pub struct GeneratedKeyPair {
    pub private_key: PrivateKeyMaterial,
    /// `v=DKIM1; k=rsa; p=<base64 SubjectPublicKeyInfo>`
    pub public_record_value: String,
    /// SHA-256 of the SubjectPublicKeyInfo DER, hex
    pub fingerprint: String,
    pub key_size: u32,
}

/// Produces DKIM signing key pairs.
///
/// Generation is CPU-bound; async callers run it on the blocking pool.
pub trait KeyMaterialGenerator: Send + Sync {
    fn generate(&self, key_size: u32) -> CoreResult<GeneratedKeyPair>;
}

/// RSA key pairs with public exponent 65537.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaKeyGenerator;

impl RsaKeyGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl KeyMaterialGenerator for RsaKeyGenerator {
    fn generate(&self, key_size: u32) -> CoreResult<GeneratedKeyPair> {
        if !(MIN_KEY_SIZE..=MAX_KEY_SIZE).contains(&key_size) {
            return Err(CoreError::ValidationError(format!(
                "DKIM key size must be between {MIN_KEY_SIZE} and {MAX_KEY_SIZE} bits, got {key_size}"
            )));
        }

        let private = RsaPrivateKey::new(&mut rsa::rand_core::OsRng, key_size as usize)
            .map_err(|e| CoreError::KeyGeneration(e.to_string()))?;
        let public = RsaPublicKey::from(&private);

        let private_der = private
            .to_pkcs8_der()
            .map_err(|e| CoreError::KeyGeneration(format!("PKCS#8 encoding failed: {e}")))?;
        let public_der = public
            .to_public_key_der()
            .map_err(|e| CoreError::KeyGeneration(format!("SPKI encoding failed: {e}")))?;

        Ok(GeneratedKeyPair {
            private_key: PrivateKeyMaterial(private_der),
            public_record_value: dkim_record_value(public_der.as_bytes()),
            fingerprint: fingerprint(public_der.as_bytes()),
            key_size,
        })
    }
}

/// TXT value for a DER-encoded SubjectPublicKeyInfo.
pub fn dkim_record_value(spki_der: &[u8]) -> String {
    format!("v=DKIM1; k=rsa; p={}", BASE64.encode(spki_der))
}

pub fn fingerprint(spki_der: &[u8]) -> String {
    hex::encode(Sha256::digest(spki_der))
}
