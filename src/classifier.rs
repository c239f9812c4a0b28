//! S-I-T field classifier
//!
//! Maps a field name to a score and a discrete level. Pure function of the
//! shared sensitivity table; no per-record state.

use crate::sensitivity::SensitivityTable;
use crate::types::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Score at or above which a field is `high`
pub const HIGH_THRESHOLD: u32 = 8;

/// Score at or above which a field is at least `medium`
pub const MEDIUM_THRESHOLD: u32 = 5;

/// Discrete sensitivity level the selection policy branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn from_score(score: u32) -> Self {
        if score >= HIGH_THRESHOLD {
            Self::High
        } else if score >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Classification of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub score: u32,
    pub level: Level,
}

/// Field classifier backed by a shared sensitivity table
#[derive(Debug, Clone)]
pub struct Classifier {
    table: Arc<SensitivityTable>,
}

impl Classifier {
    pub fn new(table: Arc<SensitivityTable>) -> Self {
        Self { table }
    }

    /// Score and level for one field name
    pub fn classify(&self, field: &str) -> ClassificationResult {
        let score = self.table.entry(field).score();
        ClassificationResult {
            score,
            level: Level::from_score(score),
        }
    }

    /// Classify every field present in a record
    pub fn classify_record(&self, record: &Record) -> BTreeMap<String, ClassificationResult> {
        record
            .keys()
            .map(|field| (field.clone(), self.classify(field)))
            .collect()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(SensitivityTable::reference()))
    }
}
