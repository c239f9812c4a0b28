//! Core record and context types
//!
//! Context enums serialize to the exact wire spellings (`LAN`, `WiFi`,
//! `viewer`, `alert`, ...) and deserialize leniently so a header written by a
//! newer publisher never makes `open` fail.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A telemetry record: flat mapping of field name to JSON value
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Network risk the record is about to travel over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum RiskLevel {
    #[default]
    #[serde(rename = "LAN")]
    Lan,
    #[serde(rename = "WiFi")]
    WiFi,
    Public,
    /// Also the fallback for unrecognized spellings
    Unknown,
}

impl RiskLevel {
    /// Anything other than a wired LAN counts as high risk
    pub fn is_high_risk(self) -> bool {
        !matches!(self, Self::Lan)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lan => "LAN",
            Self::WiFi => "WiFi",
            Self::Public => "Public",
            Self::Unknown => "Unknown",
        }
    }
}

impl From<String> for RiskLevel {
    fn from(s: String) -> Self {
        match s.as_str() {
            "LAN" => Self::Lan,
            "WiFi" => Self::WiFi,
            "Public" => Self::Public,
            // Unrecognized networks are treated as untrusted
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of the subscriber the record is destined for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum Role {
    Viewer,
    /// Also the fallback for unrecognized roles
    #[default]
    Engineer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Engineer => "engineer",
            Self::Admin => "admin",
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "viewer" => Self::Viewer,
            "admin" => Self::Admin,
            _ => Self::Engineer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the producing system is currently raising an alert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum EventState {
    #[default]
    Normal,
    Alert,
}

impl EventState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Alert => "alert",
        }
    }
}

impl From<String> for EventState {
    fn from(s: String) -> Self {
        if s == "alert" {
            Self::Alert
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime context supplied by the caller for one record
///
/// Missing keys default to `LAN`, `engineer`, `normal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    pub risk_level: RiskLevel,
    pub role: Role,
    pub event_state: EventState,
}

impl Context {
    pub fn new(risk_level: RiskLevel, role: Role, event_state: EventState) -> Self {
        Self {
            risk_level,
            role,
            event_state,
        }
    }

    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_event_state(mut self, event_state: EventState) -> Self {
        self.event_state = event_state;
        self
    }
}
