use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::errors::BridgeError;

/// One record as returned by the stream backend. Key and value are
/// base64-encoded on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamRecord {
    pub key: String,
    pub value: String,
}

/// A decoded record, ready to push to WebSocket clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub key: String,
    pub value: String,
}

impl StreamRecord {
    /// Decode the base64 key/value into text. Non-UTF-8 bytes are replaced
    /// rather than rejected; malformed base64 is an error.
    pub fn decode(&self) -> Result<OutboundMessage, BridgeError> {
        let key = BASE64
            .decode(&self.key)
            .map_err(|e| BridgeError::Decode(format!("key: {e}")))?;
        let value = BASE64
            .decode(&self.value)
            .map_err(|e| BridgeError::Decode(format!("value: {e}")))?;
        Ok(OutboundMessage {
            key: String::from_utf8_lossy(&key).into_owned(),
            value: String::from_utf8_lossy(&value).into_owned(),
        })
    }
}

/// Decode a fetched batch, preserving order. A record that fails to decode
/// is skipped with a warning; the rest of the batch still goes out.
pub fn decode_batch(records: &[StreamRecord]) -> Vec<OutboundMessage> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        match record.decode() {
            Ok(msg) => out.push(msg),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable record");
            }
        }
    }
    out
}
