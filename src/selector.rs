//! Field selection policy and identifier masking
//!
//! Exactly one selection regime applies per record:
//!
//! | event state | risk level              | encrypted levels                         |
//! |-------------|-------------------------|------------------------------------------|
//! | `alert`     | any                     | `high`, `medium`                         |
//! | `normal`    | WiFi / Public / Unknown | `high`; `medium` unless role is `viewer` |
//! | `normal`    | LAN                     | `high`                                   |
//!
//! Masking of `device_id` is decided separately from the regime.

use crate::classifier::{Classifier, Level};
use crate::types::{Context, EventState, Record, RiskLevel, Role};
use std::collections::BTreeSet;

/// Identifier field subject to masking
pub const DEVICE_ID_FIELD: &str = "device_id";

const MASK: &str = "****";
const MASK_KEEP_SUFFIX: usize = 4;

/// Selection regime for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// Alert in progress: protect everything above `low`
    Alert,
    /// Untrusted network: protect `high`, and `medium` for privileged roles
    HighRisk { include_medium: bool },
    /// Trusted LAN under normal operation: protect only `high`
    LanNormal,
}

impl Regime {
    pub fn for_context(ctx: &Context) -> Self {
        match (ctx.event_state, ctx.risk_level) {
            (EventState::Alert, _) => Self::Alert,
            (EventState::Normal, RiskLevel::Lan) => Self::LanNormal,
            (EventState::Normal, RiskLevel::WiFi | RiskLevel::Public | RiskLevel::Unknown) => {
                Self::HighRisk {
                    include_medium: ctx.role != Role::Viewer,
                }
            }
        }
    }

    /// Whether a field at `level` is encrypted under this regime
    pub fn admits(self, level: Level) -> bool {
        match (self, level) {
            (_, Level::High) => true,
            (Self::Alert, Level::Medium) => true,
            (Self::HighRisk { include_medium }, Level::Medium) => include_medium,
            _ => false,
        }
    }
}

/// Outcome of running the selector over one record
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Fields to encrypt, sorted and duplicate-free
    pub enc_fields: Vec<String>,

    /// Copy of the input with masking applied
    pub record: Record,

    /// Regime that produced `enc_fields`
    pub regime: Regime,

    /// Whether `device_id` was masked
    pub masked: bool,
}

/// Applies the selection policy on top of a classifier
#[derive(Debug, Clone, Default)]
pub struct Selector {
    classifier: Classifier,
}

impl Selector {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    /// Decide which fields to encrypt and produce the masked record
    pub fn select(&self, record: &Record, ctx: &Context) -> Selection {
        let regime = Regime::for_context(ctx);

        let enc_fields: BTreeSet<String> = self
            .classifier
            .classify_record(record)
            .into_iter()
            .filter(|(_, result)| regime.admits(result.level))
            .map(|(field, _)| field)
            .collect();

        let mut masked_record = record.clone();
        let mut masked = false;
        if self.should_mask_device_id(record, ctx) {
            if let Some(serde_json::Value::String(value)) = masked_record.get_mut(DEVICE_ID_FIELD) {
                *value = mask_identifier(value);
                masked = true;
            }
        }

        Selection {
            enc_fields: enc_fields.into_iter().collect(),
            record: masked_record,
            regime,
            masked,
        }
    }

    fn should_mask_device_id(&self, record: &Record, ctx: &Context) -> bool {
        record.contains_key(DEVICE_ID_FIELD)
            && (self.classifier.classify(DEVICE_ID_FIELD).level == Level::Medium
                || ctx.risk_level.is_high_risk())
    }
}

/// Keep all but the last four characters and append `****`
///
/// Values of four characters or fewer become `****`.
pub fn mask_identifier(value: &str) -> String {
    let len = value.chars().count();
    if len <= MASK_KEEP_SUFFIX {
        return MASK.to_string();
    }
    let mut masked: String = value.chars().take(len - MASK_KEEP_SUFFIX).collect();
    masked.push_str(MASK);
    masked
}
