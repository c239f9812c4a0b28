//! Per-field authenticated encryption
//!
//! Each selected field value is serialized to canonical JSON bytes and sealed
//! independently with AES-256-GCM under a fresh random 96-bit nonce. The
//! resulting [`CipherBox`] carries everything needed to open it except the key.

use crate::error::{FsaeError, Result};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, AeadCore, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire identifier of the only supported cipher
pub const AES_256_GCM: &str = "AES-256-GCM";

/// Nonce size for AES-256-GCM (96 bits)
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag size appended to every ciphertext
pub const TAG_LEN: usize = 16;

/// Shared symmetric key and its identifier
///
/// Injected into the codec at construction. `Debug` never prints key bytes.
#[derive(Clone)]
pub struct FieldKey {
    key_id: String,
    key: [u8; 32],
}

impl FieldKey {
    /// `key` must be exactly 32 bytes (256 bits)
    pub fn new(key_id: impl Into<String>, key: [u8; 32]) -> Self {
        Self {
            key_id: key_id.into(),
            key,
        }
    }

    /// Build a key from an arbitrary byte slice, rejecting wrong lengths
    pub fn from_slice(key_id: impl Into<String>, key: &[u8]) -> Result<Self> {
        let key: [u8; 32] = key.try_into().map_err(|_| {
            FsaeError::Config(format!("Key must be 32 bytes, got {}", key.len()))
        })?;
        Ok(Self::new(key_id, key))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldKey")
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Ciphertext packet that replaces an encrypted field's value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherBox {
    /// Marker to identify encrypted values
    pub is_encrypted: bool,

    /// Cipher identifier, `AES-256-GCM`
    pub algorithm: String,

    /// Key that sealed this box
    pub key_id: String,

    /// Base64-encoded 96-bit nonce
    pub nonce: String,

    /// Base64-encoded ciphertext with the GCM tag appended
    pub ciphertext: String,
}

impl CipherBox {
    /// Check if a JSON value looks like a cipher box
    pub fn is_cipher_box(value: &serde_json::Value) -> bool {
        value
            .get("is_encrypted")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(Into::into)
    }
}

/// Why a single field could not be opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFailureReason {
    /// Listed in `enc_fields` but absent from the record
    Missing,
    /// Value is not a cipher box at all
    NotEncrypted,
    /// Value claims to be a box but does not parse as one
    MalformedBox(String),
    /// Box was produced by a cipher this codec does not speak
    UnsupportedAlgorithm(String),
    /// Box was sealed under a different key
    KeyMismatch(String),
    /// Nonce or ciphertext is not valid base64
    InvalidEncoding(String),
    /// Decoded nonce has the wrong length
    InvalidNonceLength(usize),
    /// Ciphertext shorter than the authentication tag
    TruncatedCiphertext(usize),
    /// Authentication tag did not verify
    AuthenticationFailed,
    /// Plaintext is not valid JSON
    InvalidPlaintext(String),
}

impl fmt::Display for FieldFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "field missing from record"),
            Self::NotEncrypted => write!(f, "value is not a cipher box"),
            Self::MalformedBox(e) => write!(f, "malformed cipher box: {}", e),
            Self::UnsupportedAlgorithm(alg) => write!(f, "unsupported algorithm '{}'", alg),
            Self::KeyMismatch(kid) => write!(f, "sealed under unknown key '{}'", kid),
            Self::InvalidEncoding(e) => write!(f, "invalid base64: {}", e),
            Self::InvalidNonceLength(len) => {
                write!(f, "nonce is {} bytes, expected {}", len, NONCE_LEN)
            }
            Self::TruncatedCiphertext(len) => {
                write!(f, "ciphertext is {} bytes, shorter than the tag", len)
            }
            Self::AuthenticationFailed => write!(f, "authentication failed"),
            Self::InvalidPlaintext(e) => write!(f, "plaintext is not JSON: {}", e),
        }
    }
}

/// Trait for sealing and opening individual field values
pub trait FieldCipher: Send + Sync {
    /// Encrypt the value of `field` into a cipher box
    fn seal(&self, field: &str, value: &serde_json::Value) -> Result<CipherBox>;

    /// Decrypt a cipher box back to its plaintext JSON value
    fn open(&self, cipher_box: &CipherBox) -> std::result::Result<serde_json::Value, FieldFailureReason>;

    /// Wire identifier of the cipher
    fn algorithm(&self) -> &str;

    /// Identifier of the key this cipher seals with
    fn key_id(&self) -> &str;
}

/// AES-256-GCM field cipher bound to a single key
pub struct Aes256GcmFieldCipher {
    key_id: String,
    cipher: Aes256Gcm,
}

impl Aes256GcmFieldCipher {
    pub fn new(key: &FieldKey) -> Self {
        Self {
            key_id: key.key_id.clone(),
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.key)),
        }
    }
}

impl fmt::Debug for Aes256GcmFieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aes256GcmFieldCipher")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl FieldCipher for Aes256GcmFieldCipher {
    fn seal(&self, field: &str, value: &serde_json::Value) -> Result<CipherBox> {
        let plaintext = serde_json::to_vec(value)?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|e| FsaeError::Crypto {
                field: field.to_string(),
                reason: e.to_string(),
            })?;

        Ok(CipherBox {
            is_encrypted: true,
            algorithm: AES_256_GCM.to_string(),
            key_id: self.key_id.clone(),
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    fn open(&self, cipher_box: &CipherBox) -> std::result::Result<serde_json::Value, FieldFailureReason> {
        if cipher_box.algorithm != AES_256_GCM {
            return Err(FieldFailureReason::UnsupportedAlgorithm(
                cipher_box.algorithm.clone(),
            ));
        }
        if cipher_box.key_id != self.key_id {
            return Err(FieldFailureReason::KeyMismatch(cipher_box.key_id.clone()));
        }

        let nonce_bytes = BASE64
            .decode(&cipher_box.nonce)
            .map_err(|e| FieldFailureReason::InvalidEncoding(format!("nonce: {}", e)))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(FieldFailureReason::InvalidNonceLength(nonce_bytes.len()));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = BASE64
            .decode(&cipher_box.ciphertext)
            .map_err(|e| FieldFailureReason::InvalidEncoding(format!("ciphertext: {}", e)))?;
        if ciphertext.len() < TAG_LEN {
            return Err(FieldFailureReason::TruncatedCiphertext(ciphertext.len()));
        }

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| FieldFailureReason::AuthenticationFailed)?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| FieldFailureReason::InvalidPlaintext(e.to_string()))
    }

    fn algorithm(&self) -> &str {
        AES_256_GCM
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> FieldKey {
        FieldKey::new("key-1", [0x42; 32])
    }

    fn test_cipher() -> Aes256GcmFieldCipher {
        Aes256GcmFieldCipher::new(&test_key())
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = test_cipher();
        for value in [
            serde_json::json!(1000),
            serde_json::json!(25.37),
            serde_json::json!("op-1138"),
            serde_json::json!(true),
            serde_json::Value::Null,
        ] {
            let sealed = cipher.seal("f", &value).unwrap();
            assert_eq!(cipher.open(&sealed).unwrap(), value);
        }
    }

    #[test]
    fn test_cipher_box_wire_shape() {
        let sealed = test_cipher().seal("f", &serde_json::json!(42)).unwrap();
        let json = sealed.to_value().unwrap();

        assert_eq!(json["is_encrypted"], true);
        assert_eq!(json["algorithm"], "AES-256-GCM");
        assert_eq!(json["key_id"], "key-1");
        assert!(json["nonce"].is_string());
        assert!(json["ciphertext"].is_string());
        assert!(CipherBox::is_cipher_box(&json));

        let nonce = BASE64.decode(sealed.nonce).unwrap();
        assert_eq!(nonce.len(), NONCE_LEN);
    }

    #[test]
    fn test_is_cipher_box_false_for_plain() {
        assert!(!CipherBox::is_cipher_box(&serde_json::json!(7.35)));
        assert!(!CipherBox::is_cipher_box(&serde_json::json!({"rate": 7.35})));
        assert!(!CipherBox::is_cipher_box(&serde_json::json!({"is_encrypted": false})));
    }

    #[test]
    fn test_each_seal_unique_nonce() {
        let cipher = test_cipher();
        let value = serde_json::json!("same");

        let a = cipher.seal("f", &value).unwrap();
        let b = cipher.seal("f", &value).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_open_with_wrong_key_bytes_fails() {
        let sealed = test_cipher().seal("f", &serde_json::json!(1)).unwrap();
        let other = Aes256GcmFieldCipher::new(&FieldKey::new("key-1", [0xFF; 32]));
        assert_eq!(other.open(&sealed), Err(FieldFailureReason::AuthenticationFailed));
    }

    #[test]
    fn test_open_rejects_foreign_key_id() {
        let sealed = test_cipher().seal("f", &serde_json::json!(1)).unwrap();
        let other = Aes256GcmFieldCipher::new(&FieldKey::new("key-2", [0x42; 32]));
        assert_eq!(
            other.open(&sealed),
            Err(FieldFailureReason::KeyMismatch("key-1".to_string()))
        );
    }

    #[test]
    fn test_open_rejects_unsupported_algorithm() {
        let mut sealed = test_cipher().seal("f", &serde_json::json!(1)).unwrap();
        sealed.algorithm = "ChaCha20-Poly1305".to_string();
        assert!(matches!(
            test_cipher().open(&sealed),
            Err(FieldFailureReason::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_open_rejects_bad_nonce_length() {
        let cipher = test_cipher();
        let mut sealed = cipher.seal("f", &serde_json::json!(1)).unwrap();
        sealed.nonce = BASE64.encode([0u8; 8]);
        assert_eq!(cipher.open(&sealed), Err(FieldFailureReason::InvalidNonceLength(8)));
    }

    #[test]
    fn test_open_rejects_bad_encoding_and_truncation() {
        let cipher = test_cipher();
        let sealed = cipher.seal("f", &serde_json::json!(1)).unwrap();

        let mut bad = sealed.clone();
        bad.ciphertext = "not base64!".to_string();
        assert!(matches!(cipher.open(&bad), Err(FieldFailureReason::InvalidEncoding(_))));

        let mut short = sealed;
        short.ciphertext = BASE64.encode([1u8; 4]);
        assert_eq!(cipher.open(&short), Err(FieldFailureReason::TruncatedCiphertext(4)));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let cipher = test_cipher();
        let mut sealed = cipher.seal("f", &serde_json::json!({"deep": [1, 2]})).unwrap();
        let mut bytes = BASE64.decode(&sealed.ciphertext).unwrap();
        bytes[0] ^= 0x01;
        sealed.ciphertext = BASE64.encode(bytes);
        assert_eq!(cipher.open(&sealed), Err(FieldFailureReason::AuthenticationFailed));
    }

    #[test]
    fn test_field_key_from_slice() {
        assert!(FieldKey::from_slice("k", &[0u8; 32]).is_ok());
        assert!(matches!(
            FieldKey::from_slice("k", &[0u8; 16]),
            Err(FsaeError::Config(_))
        ));
    }

    #[test]
    fn test_field_key_debug_redacts() {
        let printed = format!("{:?}", test_key());
        assert!(printed.contains("key-1"));
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("66"));
    }
}
