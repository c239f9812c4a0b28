//! # a3s-fsae
//!
//! Field-sensitive adaptive encryption for telemetry records on a
//! publish/subscribe channel.
//!
//! ## Overview
//!
//! Each record is a flat JSON object. Given a runtime [`Context`] (network
//! risk, subscriber role, event state), the codec decides which fields need
//! confidentiality, masks the device identifier, optionally seals each
//! selected field with AES-256-GCM, and attaches an `_enc_header` describing
//! the decision so any subscriber holding the key can reverse it.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_fsae::{Context, EnvelopeCodec, FieldKey, RiskLevel};
//!
//! # fn example() -> a3s_fsae::Result<()> {
//! let codec = EnvelopeCodec::new(&FieldKey::new("kid-demo", [0x42; 32]));
//!
//! let record = serde_json::json!({
//!     "device_id": "machine-01",
//!     "operator_id": "op-1138",
//!     "speed": 1000,
//! });
//! let record = a3s_fsae::wire::record_from_value(record)?;
//!
//! let ctx = Context::default().with_risk(RiskLevel::WiFi);
//! let sealed = codec.seal(&record, &ctx, true)?;
//!
//! let opened = codec.open(sealed);
//! assert_eq!(opened.record["operator_id"], "op-1138");
//! assert_eq!(opened.record["device_id"], "machin****");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Classifier**: S-I-T score (`3S + 2I + T`) and `low`/`medium`/`high` level per field
//! - **Selector**: one of three regimes picks the fields to encrypt; `device_id` masking
//! - **EnvelopeCodec**: `seal` / `open`, per-field cipher boxes, fault-tolerant decryption
//! - **TelemetryChannel**: transport trait with in-memory and NATS implementations
//! - **Publisher / subscribers**: sealing publisher, decrypting engineer, allow-listed viewer

pub mod channel;
pub mod classifier;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod publisher;
pub mod selector;
pub mod sensitivity;
pub mod stats;
pub mod subscriber;
pub mod types;
pub mod wire;

// Re-export core types
pub use channel::{MemoryChannel, NatsChannel, PayloadStream, TelemetryChannel};
pub use classifier::{ClassificationResult, Classifier, Level};
pub use config::{FsaeConfig, NatsChannelConfig};
pub use crypto::{Aes256GcmFieldCipher, CipherBox, FieldCipher, FieldFailureReason, FieldKey};
pub use envelope::{
    Algorithm, EncryptionHeader, EnvelopeCodec, FieldFailure, OpenReport, OpenStatus, Opened,
    HEADER_FIELD,
};
pub use error::{FsaeError, Result};
pub use publisher::{ContextSchedule, PublishReport, TelemetryPublisher};
pub use selector::{mask_identifier, Regime, Selection, Selector};
pub use sensitivity::{SensitivityEntry, SensitivityTable};
pub use stats::{CryptoMode, LatencyWindow, PerfLog, WindowStats};
pub use subscriber::{EngineerSubscriber, FieldAllowList, ViewerSubscriber};
pub use types::{Context, EventState, Record, RiskLevel, Role};
