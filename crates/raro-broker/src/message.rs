use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub target: Option<String>,
    pub payload: Value,
    pub meta: Map<String, Value>,
    pub timestamp: i64,
}

impl Message {
    pub fn new(msg_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            msg_type: msg_type.into(),
            target: None,
            payload,
            meta: Map::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.meta.get("correlation_id").and_then(Value::as_str)
    }

    pub fn set_correlation_id(&mut self, id: Uuid) {
        self.meta
            .insert("correlation_id".to_string(), Value::String(id.to_string()));
    }
}
