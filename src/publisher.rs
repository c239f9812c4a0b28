//! Publishing side: seal records and hand them to a channel

use crate::channel::TelemetryChannel;
use crate::envelope::{Algorithm, EncryptionHeader, EnvelopeCodec};
use crate::error::Result;
use crate::types::{Context, EventState, Record, RiskLevel, Role};
use crate::wire;
use bytes::Bytes;
use std::sync::Arc;

/// Size and policy summary of one published record
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    /// Serialized size of the record before sealing
    pub raw_bytes: usize,

    /// Serialized size of what went on the wire
    pub sealed_bytes: usize,

    pub algorithm: Algorithm,
    pub enc_fields: Vec<String>,
}

/// Seals records with a shared codec and publishes them
pub struct TelemetryPublisher {
    codec: Arc<EnvelopeCodec>,
    channel: Arc<dyn TelemetryChannel>,
    apply_cipher: bool,
}

impl TelemetryPublisher {
    /// Publisher that encrypts selected fields
    pub fn new(codec: Arc<EnvelopeCodec>, channel: Arc<dyn TelemetryChannel>) -> Self {
        Self {
            codec,
            channel,
            apply_cipher: true,
        }
    }

    /// Switch between real encryption and selection-only headers
    pub fn with_cipher(mut self, apply_cipher: bool) -> Self {
        self.apply_cipher = apply_cipher;
        self
    }

    pub fn applies_cipher(&self) -> bool {
        self.apply_cipher
    }

    /// Seal one record under `ctx` and publish it
    pub async fn publish(&self, record: &Record, ctx: &Context) -> Result<PublishReport> {
        let raw_bytes = wire::encode_record(record)?.len();

        let sealed = self.codec.seal(record, ctx, self.apply_cipher)?;
        let header = EncryptionHeader::from_record(&sealed)?;
        let payload = wire::encode_record(&sealed)?;
        let sealed_bytes = payload.len();

        self.channel.publish(Bytes::from(payload)).await?;

        let (algorithm, enc_fields) = match header {
            Some(h) => (h.algorithm, h.enc_fields),
            None => (Algorithm::NoEncryption, Vec::new()),
        };

        tracing::debug!(
            channel = self.channel.name(),
            crypto = self.apply_cipher,
            raw = raw_bytes,
            sealed = sealed_bytes,
            risk_level = %ctx.risk_level,
            enc_fields = ?enc_fields,
            "Record published"
        );

        Ok(PublishReport {
            raw_bytes,
            sealed_bytes,
            algorithm,
            enc_fields,
        })
    }
}

/// Simulated context feed for a single publisher
///
/// Risk alternates between WiFi and LAN every `period` records, starting
/// on WiFi; role and event state stay fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSchedule {
    pub period: u64,
    pub role: Role,
    pub event_state: EventState,
}

impl Default for ContextSchedule {
    fn default() -> Self {
        Self {
            period: 20,
            role: Role::Engineer,
            event_state: EventState::Normal,
        }
    }
}

impl ContextSchedule {
    /// Context for the `seq`-th record
    pub fn context_for(&self, seq: u64) -> Context {
        let risk_level = if (seq / self.period.max(1)) % 2 == 0 {
            RiskLevel::WiFi
        } else {
            RiskLevel::Lan
        };
        Context::new(risk_level, self.role, self.event_state)
    }
}
