use serde::{Deserialize, Serialize};

use crate::error::KvError;

/// Every value stored in the main table is wrapped so TTL metadata travels
/// with the bytes; the KV layer never exposes the envelope to callers.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub expires_at_ms: Option<i64>,
    pub version: u64,
    pub bytes: Vec<u8>,
}

impl Envelope {
    pub fn fresh(bytes: Vec<u8>, version: u64, expires_at_ms: Option<i64>) -> Self {
        Self {
            expires_at_ms,
            version,
            bytes,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.map(|exp| now_ms >= exp).unwrap_or(false)
    }

    pub fn encode(&self) -> Result<Vec<u8>, KvError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, KvError> {
        Ok(bincode::deserialize(raw)?)
    }
}

pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
