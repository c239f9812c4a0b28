//! Envelope codec: seal and open telemetry records
//!
//! `seal` runs the selector, optionally replaces each selected field with a
//! [`CipherBox`], and attaches an [`EncryptionHeader`] under `_enc_header`.
//! `open` reads that header and restores every listed field it can. A single
//! field failing to open never aborts the rest of the record.

use crate::classifier::Classifier;
use crate::config::FsaeConfig;
use crate::crypto::{Aes256GcmFieldCipher, CipherBox, FieldCipher, FieldFailureReason, FieldKey};
use crate::error::Result;
use crate::selector::Selector;
use crate::types::{Context, EventState, Record, RiskLevel, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Reserved record key holding the encryption header
pub const HEADER_FIELD: &str = "_enc_header";

/// Policy identifier written into every header
pub const DEFAULT_POLICY_ID: &str = "SIT-v1";

/// Sentinel algorithm meaning "selection recorded, nothing encrypted"
pub const NO_ENCRYPTION: &str = "NONE";

/// Algorithm named in a header
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Algorithm {
    /// Fields were sealed with AES-256-GCM
    Aes256Gcm,
    /// Fields were only selected, not encrypted
    NoEncryption,
    /// Anything else, passed through untouched by `open`
    Other(String),
}

impl Algorithm {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Aes256Gcm => crate::crypto::AES_256_GCM,
            Self::NoEncryption => NO_ENCRYPTION,
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Algorithm {
    fn from(s: String) -> Self {
        match s.as_str() {
            crate::crypto::AES_256_GCM => Self::Aes256Gcm,
            NO_ENCRYPTION => Self::NoEncryption,
            _ => Self::Other(s),
        }
    }
}

impl From<Algorithm> for String {
    fn from(alg: Algorithm) -> Self {
        match alg {
            Algorithm::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record policy decision attached under [`HEADER_FIELD`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionHeader {
    pub policy_id: String,

    /// Absent in headers from producers that do not name their key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    pub algorithm: Algorithm,

    /// Context fields are informational; bad values fall back to defaults
    #[serde(default, deserialize_with = "lenient_context_field")]
    pub risk_level: RiskLevel,

    #[serde(default, deserialize_with = "lenient_context_field")]
    pub role: Role,

    #[serde(default, deserialize_with = "lenient_context_field")]
    pub event_state: EventState,

    /// Sorted, duplicate-free field names the policy selected
    #[serde(default)]
    pub enc_fields: Vec<String>,
}

fn lenient_context_field<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: From<String> + Default,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => T::from(s),
        _ => T::default(),
    })
}

impl EncryptionHeader {
    /// Read the header attached to a record, if any
    ///
    /// `Ok(None)` when there is no header; `Err` when one is present but
    /// does not parse.
    pub fn from_record(record: &Record) -> Result<Option<Self>> {
        record
            .get(HEADER_FIELD)
            .map(|value| serde_json::from_value(value.clone()).map_err(Into::into))
            .transpose()
    }

    pub fn context(&self) -> Context {
        Context::new(self.risk_level, self.role, self.event_state)
    }

    /// Whether `open` will attempt decryption for this header
    pub fn is_encrypted(&self) -> bool {
        self.algorithm == Algorithm::Aes256Gcm
    }
}

/// A field that `open` could not restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    pub field: String,
    pub reason: FieldFailureReason,
}

/// What `open` did with the record as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenStatus {
    /// Header named the supported cipher and our key; fields were processed
    Decrypted,
    /// No header attached
    NoHeader,
    /// Header present but unreadable
    MalformedHeader(String),
    /// Selection-only or unrecognized algorithm
    Passthrough(Algorithm),
    /// Header names a key this codec does not hold
    KeyMismatch(String),
}

/// Diagnostics from one `open` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenReport {
    pub status: OpenStatus,

    /// Fields restored to plaintext
    pub decrypted: Vec<String>,

    /// Fields left as found
    pub failures: Vec<FieldFailure>,
}

impl OpenReport {
    fn with_status(status: OpenStatus) -> Self {
        Self {
            status,
            decrypted: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when every listed field was restored
    pub fn is_complete(&self) -> bool {
        self.status == OpenStatus::Decrypted && self.failures.is_empty()
    }
}

/// Output of `open`: the consumer-visible record plus diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct Opened {
    pub record: Record,
    pub report: OpenReport,
}

/// Seals and opens records under one key and one sensitivity table
///
/// Holds no mutable state; share it across tasks with `Arc`.
pub struct EnvelopeCodec {
    selector: Selector,
    cipher: Arc<dyn FieldCipher>,
    policy_id: String,
}

impl EnvelopeCodec {
    /// Codec using the reference sensitivity table and AES-256-GCM
    pub fn new(key: &FieldKey) -> Self {
        Self::with_cipher(Selector::default(), Arc::new(Aes256GcmFieldCipher::new(key)))
    }

    /// Codec with an explicit selector and cipher
    pub fn with_cipher(selector: Selector, cipher: Arc<dyn FieldCipher>) -> Self {
        Self {
            selector,
            cipher,
            policy_id: DEFAULT_POLICY_ID.to_string(),
        }
    }

    /// Build a codec from loaded configuration
    pub fn from_config(config: &FsaeConfig) -> Result<Self> {
        let key = config.field_key()?;
        let classifier = Classifier::new(Arc::new(config.sensitivity_table()));
        Ok(Self::with_cipher(
            Selector::new(classifier),
            Arc::new(Aes256GcmFieldCipher::new(&key)),
        )
        .with_policy_id(config.policy_id.clone()))
    }

    pub fn with_policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = policy_id.into();
        self
    }

    pub fn key_id(&self) -> &str {
        self.cipher.key_id()
    }

    pub fn policy_id(&self) -> &str {
        &self.policy_id
    }

    /// Select, mask, optionally encrypt, and attach the header
    pub fn seal(&self, record: &Record, ctx: &Context, apply_cipher: bool) -> Result<Record> {
        let selection = self.selector.select(record, ctx);
        let mut out = selection.record;

        let mut header = EncryptionHeader {
            policy_id: self.policy_id.clone(),
            key_id: Some(self.cipher.key_id().to_string()),
            algorithm: if apply_cipher {
                Algorithm::from(self.cipher.algorithm().to_string())
            } else {
                Algorithm::NoEncryption
            },
            risk_level: ctx.risk_level,
            role: ctx.role,
            event_state: ctx.event_state,
            enc_fields: Vec::new(),
        };

        if apply_cipher {
            for field in selection.enc_fields {
                let Some(value) = out.get_mut(&field) else {
                    continue;
                };
                let sealed = self.cipher.seal(&field, value)?;
                *value = sealed.to_value()?;
                header.enc_fields.push(field);
            }
        } else {
            header.enc_fields = selection.enc_fields;
        }

        tracing::debug!(
            policy = %header.policy_id,
            algorithm = %header.algorithm,
            risk_level = %ctx.risk_level,
            role = %ctx.role,
            event_state = %ctx.event_state,
            enc_fields = ?header.enc_fields,
            masked = selection.masked,
            "Record sealed"
        );

        out.insert(HEADER_FIELD.to_string(), serde_json::to_value(&header)?);
        Ok(out)
    }

    /// Restore every field listed in the header that can be opened
    ///
    /// Never fails: records without a usable header pass through unchanged,
    /// and fields that do not open are left as found and reported.
    pub fn open(&self, record: Record) -> Opened {
        let header = match EncryptionHeader::from_record(&record) {
            Ok(Some(header)) => header,
            Ok(None) => {
                return Opened {
                    record,
                    report: OpenReport::with_status(OpenStatus::NoHeader),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable encryption header, record passed through");
                return Opened {
                    record,
                    report: OpenReport::with_status(OpenStatus::MalformedHeader(e.to_string())),
                };
            }
        };

        if header.algorithm.as_str() != self.cipher.algorithm() {
            return Opened {
                record,
                report: OpenReport::with_status(OpenStatus::Passthrough(header.algorithm)),
            };
        }

        if let Some(key_id) = header.key_id.as_deref() {
            if key_id != self.cipher.key_id() {
                tracing::warn!(
                    key_id = %key_id,
                    expected = %self.cipher.key_id(),
                    "Unknown key id, skipping decryption"
                );
                return Opened {
                    record,
                    report: OpenReport::with_status(OpenStatus::KeyMismatch(key_id.to_string())),
                };
            }
        }

        let mut out = record;
        let mut report = OpenReport::with_status(OpenStatus::Decrypted);

        for field in &header.enc_fields {
            match self.open_field(out.get(field)) {
                Ok(plain) => {
                    out.insert(field.clone(), plain);
                    report.decrypted.push(field.clone());
                }
                Err(reason) => {
                    tracing::warn!(field = %field, reason = %reason, "Field decryption failed");
                    report.failures.push(FieldFailure {
                        field: field.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::debug!(
            decrypted = report.decrypted.len(),
            failed = report.failures.len(),
            "Record opened"
        );

        Opened {
            record: out,
            report,
        }
    }

    fn open_field(
        &self,
        value: Option<&serde_json::Value>,
    ) -> std::result::Result<serde_json::Value, FieldFailureReason> {
        let value = value.ok_or(FieldFailureReason::Missing)?;
        if !CipherBox::is_cipher_box(value) {
            return Err(FieldFailureReason::NotEncrypted);
        }
        let cipher_box: CipherBox = serde_json::from_value(value.clone())
            .map_err(|e| FieldFailureReason::MalformedBox(e.to_string()))?;
        self.cipher.open(&cipher_box)
    }
}

impl fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("policy_id", &self.policy_id)
            .field("key_id", &self.cipher.key_id())
            .field("algorithm", &self.cipher.algorithm())
            .finish()
    }
}
