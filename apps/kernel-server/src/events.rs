// [[RARO]]/apps/kernel-server/src/events.rs
// Purpose: Lifecycle + message-count events streamed over the cell WebSocket.
// Architecture: Domain Event Layer
// Dependencies: Serde, Chrono, Uuid

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{AgentStatus, CellPhase};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CellEventKind {
    PhaseChanged { phase: CellPhase },
    AgentStatusChanged { agent_id: String, status: AgentStatus },
    AgentRestarted { agent_id: String, attempt: u32 },
    MessageCount { agent_id: String, topic: String, count: u64 },
    Log { message: String, detail: Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellEvent {
    pub id: String,
    pub cell_id: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub kind: CellEventKind,
}

impl CellEvent {
    pub fn new(cell_id: &str, kind: CellEventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            cell_id: cell_id.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            kind,
        }
    }
}
