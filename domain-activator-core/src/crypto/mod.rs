//! encryption module
//!
//! AES-256-GCM sealing of DKIM private keys at rest, plus RSA key generation
//! ([`dkim`]).

pub mod dkim;

pub use dkim::{GeneratedKeyPair, KeyMaterialGenerator, PrivateKeyMaterial, RsaKeyGenerator};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::pbkdf2_hmac_array;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{CoreError, CoreResult};

/// PBKDF2-HMAC-SHA256 iterations for newly sealed blobs (OWASP 2023).
pub const PBKDF2_ITERATIONS: u32 = 600_000;
const SALT_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32; // AES-256

/// Sealed bytes, all fields base64 except `iterations`.
///
/// The iteration count travels with the blob so the default can be raised without
/// breaking keys sealed earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlob {
    pub iterations: u32,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LENGTH] {
    pbkdf2_hmac_array::<Sha256, KEY_LENGTH>(password.as_bytes(), salt, iterations)
}

/// Encrypt `plaintext` under a key derived from `password`.
pub fn seal(plaintext: &[u8], password: &str) -> CoreResult<EncryptedBlob> {
    seal_with_iterations(plaintext, password, PBKDF2_ITERATIONS)
}

/// [`seal`] with an explicit PBKDF2 iteration count.
pub fn seal_with_iterations(
    plaintext: &[u8],
    password: &str,
    iterations: u32,
) -> CoreResult<EncryptedBlob> {
    if password.is_empty() {
        return Err(CoreError::ValidationError(
            "encryption key must not be empty".to_string(),
        ));
    }

    let mut salt = [0u8; SALT_LENGTH];
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::rng().fill_bytes(&mut salt);
    rand::rng().fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &salt, iterations);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CoreError::SerializationError(format!("Failed to create cipher: {e}")))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CoreError::SerializationError(format!("Encryption failed: {e}")))?;

    Ok(EncryptedBlob {
        iterations,
        salt: BASE64.encode(salt),
        nonce: BASE64.encode(nonce_bytes),
        ciphertext: BASE64.encode(ciphertext),
    })
}

/// Decrypt a blob produced by [`seal`].
pub fn open(blob: &EncryptedBlob, password: &str) -> CoreResult<Vec<u8>> {
    let salt = BASE64
        .decode(&blob.salt)
        .map_err(|e| CoreError::SerializationError(format!("Invalid salt: {e}")))?;
    let nonce_bytes = BASE64
        .decode(&blob.nonce)
        .map_err(|e| CoreError::SerializationError(format!("Invalid nonce: {e}")))?;
    let ciphertext = BASE64
        .decode(&blob.ciphertext)
        .map_err(|e| CoreError::SerializationError(format!("Invalid ciphertext: {e}")))?;
    if nonce_bytes.len() != NONCE_LENGTH {
        return Err(CoreError::SerializationError(format!(
            "Invalid nonce length: {}",
            nonce_bytes.len()
        )));
    }

    let key = derive_key(password, &salt, blob.iterations);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CoreError::SerializationError(format!("Failed to create cipher: {e}")))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    cipher.decrypt(nonce, ciphertext.as_ref()).map_err(|_| {
        CoreError::SerializationError(
            "Decryption failed: wrong encryption key or corrupted data".to_string(),
        )
    })
}
