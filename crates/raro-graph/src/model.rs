use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub id: String,
    pub vtype: String,
    pub properties: HashMap<String, Value>,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub etype: String,
    pub from: String,
    pub to: String,
    pub weight: f64,
    pub properties: HashMap<String, Value>,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub vertex_count: u64,
    pub edge_count: u64,
    pub vertex_types: Vec<String>,
    pub edge_types: Vec<String>,
    pub total_size: u64,
    pub index_count: u64,
    pub avg_vertex_size: f64,
    pub avg_edge_size: f64,
    pub last_access: i64,
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Stringifies a property value for secondary-index encoding. Callers who
/// need typed range semantics are expected to supply a pre-formatted string
/// (e.g. zero-padded numbers) as the property value itself.
pub(crate) fn stringify_prop(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
