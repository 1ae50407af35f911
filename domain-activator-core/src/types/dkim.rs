//! DKIM key records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedBlob;

/// Signing algorithm recorded for every key the pipeline generates.
pub const DKIM_ALGORITHM: &str = "rsa";

/// A DKIM key pair as stored: public half verbatim, private half sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DkimKey {
    pub id: String,
    pub domain_id: String,
    pub selector: String,
    pub algorithm: String,
    pub key_size: u32,
    /// `v=DKIM1; k=rsa; p=...`, published as-is
    pub public_record_value: String,
    /// SHA-256 of the public key DER, hex
    pub fingerprint: String,
    /// PKCS#8 private key, AES-256-GCM sealed
    pub private_key: EncryptedBlob,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub rotated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl DkimKey {
    /// Retire the key: keep it for dual publication, stop signing with it.
    pub fn retire(&mut self) {
        self.active = false;
        self.rotated_at = Some(Utc::now());
    }
}
