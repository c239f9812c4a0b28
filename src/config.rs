//! Configuration for the codec and the NATS channel
//!
//! Both structs deserialize from camelCase JSON and fall back to defaults
//! for missing keys.

use crate::crypto::FieldKey;
use crate::envelope::DEFAULT_POLICY_ID;
use crate::error::{FsaeError, Result};
use crate::sensitivity::{SensitivityEntry, SensitivityTable};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Codec configuration: policy id, shared key, sensitivity weights
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FsaeConfig {
    /// Policy identifier written into every header
    pub policy_id: String,

    /// Identifier of the shared key
    pub key_id: String,

    /// Base64-encoded 32-byte AES-256 key
    pub key: String,

    /// Per-field S-I-T weights; empty means the reference table
    pub sensitivity: HashMap<String, SensitivityEntry>,
}

impl Default for FsaeConfig {
    fn default() -> Self {
        Self {
            policy_id: DEFAULT_POLICY_ID.to_string(),
            key_id: String::new(),
            key: String::new(),
            sensitivity: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for FsaeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsaeConfig")
            .field("policy_id", &self.policy_id)
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .field("sensitivity", &self.sensitivity.len())
            .finish()
    }
}

impl FsaeConfig {
    /// Configuration for an in-process key
    pub fn with_key(key_id: impl Into<String>, key: &[u8; 32]) -> Self {
        Self {
            key_id: key_id.into(),
            key: BASE64.encode(key),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FsaeError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = serde_json::from_str(&json).map_err(|e| {
            FsaeError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key_id = %config.key_id,
            fields = config.sensitivity.len(),
            "Config loaded"
        );
        Ok(config)
    }

    /// Decode and validate the shared key
    pub fn field_key(&self) -> Result<FieldKey> {
        if self.key_id.is_empty() {
            return Err(FsaeError::Config("keyId must not be empty".to_string()));
        }
        let bytes = BASE64
            .decode(self.key.trim())
            .map_err(|e| FsaeError::Config(format!("Invalid key encoding: {}", e)))?;
        FieldKey::from_slice(self.key_id.clone(), &bytes)
    }

    /// Build the immutable sensitivity table
    pub fn sensitivity_table(&self) -> SensitivityTable {
        if self.sensitivity.is_empty() {
            SensitivityTable::reference()
        } else {
            SensitivityTable::from_entries(self.sensitivity.clone())
        }
    }
}

/// Connection settings for the NATS telemetry channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NatsChannelConfig {
    /// NATS server URL
    pub url: String,

    /// Subject records are published on
    pub subject: String,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Optional authentication token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Client name reported to the server; generated when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

impl Default for NatsChannelConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            subject: "dt.telemetry".to_string(),
            connect_timeout_secs: 5,
            token: None,
            client_name: None,
        }
    }
}
