//! Payload serialization
//!
//! Stored payloads are strings. The default serializer writes JSON, the same
//! format connect-style stores use, but any string encoding can be plugged in.

use serde_json::Value;

use crate::error::SessionError;

/// Converts session payloads to and from their stored string form
pub trait Serializer: Send + Sync + 'static {
    fn serialize(&self, payload: &Value) -> Result<String, SessionError>;

    /// Must fail with [`SessionError::MalformedPayload`] on invalid input
    fn deserialize(&self, raw: &str) -> Result<Value, SessionError>;
}

/// JSON serializer backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, payload: &Value) -> Result<String, SessionError> {
        serde_json::to_string(payload).map_err(|e| SessionError::SerializationError(e.to_string()))
    }

    fn deserialize(&self, raw: &str) -> Result<Value, SessionError> {
        serde_json::from_str(raw).map_err(|e| SessionError::MalformedPayload(e.to_string()))
    }
}
