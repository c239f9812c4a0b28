//! Static S-I-T sensitivity table
//!
//! Built once at startup and shared read-only (`Arc<SensitivityTable>`)
//! by every classifier instance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sensitivity, impact and timeliness weights for one field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivityEntry {
    /// Confidentiality need
    #[serde(alias = "S")]
    pub s: u8,

    /// Operational impact if disclosed or tampered with
    #[serde(alias = "I")]
    pub i: u8,

    /// How quickly the value goes stale
    #[serde(alias = "T")]
    pub t: u8,
}

impl SensitivityEntry {
    pub const fn new(s: u8, i: u8, t: u8) -> Self {
        Self { s, i, t }
    }

    /// Weighted S-I-T score: sensitivity dominates, then impact, then timeliness
    pub fn score(&self) -> u32 {
        3 * u32::from(self.s) + 2 * u32::from(self.i) + u32::from(self.t)
    }
}

/// Reference weights for the digital-twin telemetry feed
const REFERENCE_ENTRIES: &[(&str, SensitivityEntry)] = &[
    ("timestamp", SensitivityEntry::new(0, 1, 3)),
    ("device_id", SensitivityEntry::new(1, 1, 1)),
    ("operator_id", SensitivityEntry::new(3, 2, 1)),
    ("temperature", SensitivityEntry::new(1, 1, 3)),
    ("pressure", SensitivityEntry::new(1, 2, 3)),
    ("speed", SensitivityEntry::new(1, 3, 3)),
    ("fault_code", SensitivityEntry::new(2, 3, 2)),
    ("geo_lat", SensitivityEntry::new(3, 2, 2)),
    ("geo_lon", SensitivityEntry::new(3, 2, 2)),
];

/// Immutable field name → S-I-T weights mapping
///
/// Fields absent from the table weigh `S=I=T=0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensitivityTable {
    entries: HashMap<String, SensitivityEntry>,
}

impl SensitivityTable {
    /// Table recognizing the standard telemetry fields
    pub fn reference() -> Self {
        Self::from_entries(
            REFERENCE_ENTRIES
                .iter()
                .map(|(name, entry)| (name.to_string(), *entry)),
        )
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, SensitivityEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Weights for a field, all-zero when the field is unknown
    pub fn entry(&self, field: &str) -> SensitivityEntry {
        self.entries.get(field).copied().unwrap_or_default()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Known field names, sorted
    pub fn fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
