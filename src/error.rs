//! Error types for a3s-fsae

use thiserror::Error;

/// Errors that can occur while sealing, opening, or moving telemetry records
///
/// Per-field decryption problems are not errors: `open` reports them as
/// [`FieldFailure`](crate::envelope::FieldFailure) values and keeps going.
#[derive(Debug, Error)]
pub enum FsaeError {
    /// Channel connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Publish failure
    #[error("Failed to publish record to subject '{subject}': {reason}")]
    Publish {
        subject: String,
        reason: String,
    },

    /// Subscribe failure
    #[error("Failed to subscribe to subject '{subject}': {reason}")]
    Subscribe {
        subject: String,
        reason: String,
    },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error (bad key material, unreadable config file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption failure while sealing a field
    #[error("Encryption failed for field '{field}': {reason}")]
    Crypto {
        field: String,
        reason: String,
    },

    /// Input was not a flat JSON object
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Filesystem failure (perf log)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for fsae operations
pub type Result<T> = std::result::Result<T, FsaeError>;
