//! Wire boundary between the codec and the transport
//!
//! Anything that is not a flat JSON object is rejected here, before it can
//! reach the codec.

use crate::error::{FsaeError, Result};
use crate::types::{Context, Record};
use serde_json::Value;

/// Serialize a (sealed) record to JSON bytes
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(Into::into)
}

/// Parse JSON bytes into a record, rejecting non-object payloads
pub fn decode_record(bytes: &[u8]) -> Result<Record> {
    let value: Value = serde_json::from_slice(bytes)?;
    record_from_value(value)
}

/// Accept a JSON value as a record only if it is an object
pub fn record_from_value(value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(FsaeError::MalformedRecord(format!(
            "expected a JSON object, got {}",
            value_kind(&other)
        ))),
    }
}

/// Parse a caller-supplied context object; missing keys take defaults
pub fn context_from_value(value: &Value) -> Result<Context> {
    match value {
        Value::Null => Ok(Context::default()),
        Value::Object(_) => serde_json::from_value(value.clone()).map_err(Into::into),
        other => Err(FsaeError::MalformedRecord(format!(
            "context must be a JSON object, got {}",
            value_kind(other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
