// [[RARO]]/apps/kernel-server/src/models.rs
// Purpose: Pool/cell configuration schema and runtime state models.
// Architecture: Shared Data Layer
// Dependencies: Serde

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Spawn,
    Call,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTypeSpec {
    pub agent_type: String,
    pub binary: String,
    pub operator: Operator,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub config_defaults: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolFile {
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub agent_types: Vec<AgentTypeSpec>,
}

fn default_startup_timeout_ms() -> u64 {
    10_000
}
fn default_shutdown_timeout_ms() -> u64 {
    5_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_health_check_interval_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            startup_timeout_ms: default_startup_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellAgentSpec {
    pub id: String,
    pub agent_type: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub ingress: Option<String>,
    pub egress: Option<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellFile {
    pub cell: CellConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    pub agents: Vec<CellAgentSpec>,
}

// === RUNTIME STATE ===

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CellPhase {
    Loading,
    Planning,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Pending,
    Starting,
    Ready,
    Running,
    Restarting,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRuntimeInfo {
    pub id: String,
    pub agent_type: String,
    pub status: AgentStatus,
    pub restart_count: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellState {
    pub cell_id: String,
    pub config_id: String,
    pub phase: CellPhase,
    pub agents: Vec<AgentRuntimeInfo>,
    pub started_at: String,
    pub ended_at: Option<String>,
}
