// [[RARO]]/apps/kernel-server/src/runtime.rs
// Purpose: Cell orchestrator: Load/Plan/Start/Supervise/Stop over a pool+cell
//   configuration pair.
// Architecture: Domain Logic Layer
// Dependencies: dashmap, tokio, raro-broker, raro-agent

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use raro_agent::{Agent, AgentConfig, AgentRuntime, AgentError, BaseAgentServices};
use raro_broker::{Broker, Message};

use crate::config::{self, ConfigError};
use crate::dag::DAG;
use crate::events::{CellEvent, CellEventKind};
use crate::fs_manager::ProjectLayout;
use crate::models::{
    AgentRuntimeInfo, AgentStatus, CellAgentSpec, CellConfig, CellPhase, CellState, Operator,
    PoolConfig,
};

#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cell not found: {0}")]
    CellNotFound(String),
    #[error("agent '{0}' exceeded its restart budget")]
    RestartBudgetExceeded(String),
    #[error("failed to spawn process for agent '{agent_id}': {source}")]
    SpawnFailure {
        agent_id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Constructs an in-process `Agent` for a given `agent_type`. Deployments
/// register the concrete agent implementations they compile in; this is
/// the "call" half of the `operator: spawn|call` split. There is no
/// equivalent registry for `spawn`: those agents are separate binaries
/// started by path.
pub type AgentFactory = Arc<dyn Fn() -> Box<dyn Agent> + Send + Sync>;

struct RunningAgent {
    cancellation: CancellationToken,
    join: Option<JoinHandle<()>>,
    child: Option<Child>,
}

struct CellHandle {
    cell_id: String,
    cell_config: CellConfig,
    pool_config: PoolConfig,
    dag: DAG,
    phase: Mutex<CellPhase>,
    agents: DashMap<String, AgentRuntimeInfo>,
    running: Mutex<HashMap<String, RunningAgent>>,
    supervise_cancel: CancellationToken,
    started_at: String,
    ended_at: Mutex<Option<String>>,
}

pub struct CellOrchestrator {
    broker: Broker,
    cells: DashMap<String, Arc<CellHandle>>,
    factories: DashMap<String, AgentFactory>,
    event_bus: broadcast::Sender<CellEvent>,
    layout: ProjectLayout,
}

impl CellOrchestrator {
    pub fn new(data_root: impl Into<std::path::PathBuf>, project_id: &str) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(256);
        Arc::new(Self {
            broker: Broker::new(),
            cells: DashMap::new(),
            factories: DashMap::new(),
            event_bus: tx,
            layout: ProjectLayout::new(data_root, project_id),
        })
    }

    pub fn register_agent_factory(&self, agent_type: &str, factory: AgentFactory) {
        self.factories.insert(agent_type.to_string(), factory);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CellEvent> {
        self.event_bus.subscribe()
    }

    fn emit(&self, cell_id: &str, kind: CellEventKind) {
        let _ = self.event_bus.send(CellEvent::new(cell_id, kind));
    }

    pub fn get_state(&self, cell_id: &str) -> Option<CellState> {
        let handle = self.cells.get(cell_id)?;
        Some(CellState {
            cell_id: handle.cell_id.clone(),
            config_id: handle.cell_config.id.clone(),
            phase: *handle.phase.lock().unwrap(),
            agents: handle.agents.iter().map(|e| e.value().clone()).collect(),
            started_at: handle.started_at.clone(),
            ended_at: handle.ended_at.lock().unwrap().clone(),
        })
    }

    /// Load + Plan, then spawns the Start/Supervise background task and
    /// returns the new cell's id immediately.
    pub fn start_cell(self: &Arc<Self>, pool: PoolConfig, cell: CellConfig) -> Result<String, KernelError> {
        let dag = config::plan_cell(&pool, &cell)?;
        let cell_id = Uuid::new_v4().to_string();

        let agents = DashMap::new();
        for agent in &cell.agents {
            agents.insert(
                agent.id.clone(),
                AgentRuntimeInfo {
                    id: agent.id.clone(),
                    agent_type: agent.agent_type.clone(),
                    status: AgentStatus::Pending,
                    restart_count: 0,
                    last_error: None,
                },
            );
        }

        let handle = Arc::new(CellHandle {
            cell_id: cell_id.clone(),
            cell_config: cell,
            pool_config: pool,
            dag,
            phase: Mutex::new(CellPhase::Starting),
            agents,
            running: Mutex::new(HashMap::new()),
            supervise_cancel: CancellationToken::new(),
            started_at: Utc::now().to_rfc3339(),
            ended_at: Mutex::new(None),
        });
        self.cells.insert(cell_id.clone(), handle.clone());
        self.emit(&cell_id, CellEventKind::PhaseChanged { phase: CellPhase::Starting });

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.drive_startup(handle).await;
        });

        Ok(cell_id)
    }

    async fn drive_startup(self: Arc<Self>, handle: Arc<CellHandle>) {
        let order = match handle.dag.topological_sort() {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(cell_id = %handle.cell_id, error = %e, "topological sort failed after planning succeeded");
                self.fail_cell(&handle, &[]).await;
                return;
            }
        };

        let mut started: Vec<String> = Vec::new();
        for agent_id in &order {
            match self.start_agent_with_retry(&handle, agent_id).await {
                Ok(()) => started.push(agent_id.clone()),
                Err(e) => {
                    tracing::error!(cell_id = %handle.cell_id, agent_id, error = %e, "agent failed to start; tearing down");
                    self.teardown(&handle, &started).await;
                    *handle.phase.lock().unwrap() = CellPhase::Failed;
                    *handle.ended_at.lock().unwrap() = Some(Utc::now().to_rfc3339());
                    self.emit(&handle.cell_id, CellEventKind::PhaseChanged { phase: CellPhase::Failed });
                    return;
                }
            }
        }

        *handle.phase.lock().unwrap() = CellPhase::Running;
        self.emit(&handle.cell_id, CellEventKind::PhaseChanged { phase: CellPhase::Running });

        let orchestrator = self.clone();
        let supervise_handle = handle.clone();
        tokio::spawn(async move {
            orchestrator.supervise(supervise_handle).await;
        });
    }

    async fn start_agent_with_retry(&self, handle: &Arc<CellHandle>, agent_id: &str) -> Result<(), KernelError> {
        let spec = self.agent_spec(handle, agent_id);
        let orchestration = &handle.cell_config.orchestration;

        let mut attempt = 0;
        loop {
            self.set_agent_status(handle, agent_id, AgentStatus::Starting);
            match self.launch_agent(handle, &spec).await {
                Ok(running) => {
                    handle.running.lock().unwrap().insert(agent_id.to_string(), running);
                    self.set_agent_status(handle, agent_id, AgentStatus::Ready);
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    self.record_agent_error(handle, agent_id, &e.to_string());
                    if attempt > orchestration.max_retries {
                        return Err(e);
                    }
                    tracing::warn!(cell_id = %handle.cell_id, agent_id, attempt, "agent start failed, retrying");
                    tokio::time::sleep(Duration::from_millis(orchestration.retry_delay_ms)).await;
                }
            }
        }
    }

    fn agent_spec(&self, handle: &Arc<CellHandle>, agent_id: &str) -> CellAgentSpec {
        handle
            .cell_config
            .agents
            .iter()
            .find(|a| a.id == agent_id)
            .cloned()
            .expect("agent_id came from this cell's own DAG")
    }

    async fn launch_agent(&self, handle: &Arc<CellHandle>, spec: &CellAgentSpec) -> Result<RunningAgent, KernelError> {
        let type_spec = handle
            .pool_config
            .agent_types
            .iter()
            .find(|t| t.agent_type == spec.agent_type)
            .expect("agent_type existence was validated during Plan");

        match type_spec.operator {
            Operator::Call => self.launch_in_process(handle, spec, type_spec),
            Operator::Spawn => self.launch_process(handle, spec, type_spec).await,
        }
    }

    fn launch_in_process(
        &self,
        handle: &Arc<CellHandle>,
        spec: &CellAgentSpec,
        type_spec: &crate::models::AgentTypeSpec,
    ) -> Result<RunningAgent, KernelError> {
        let factory = self.factories.get(&spec.agent_type).map(|f| f.clone());
        let agent: Box<dyn Agent> = match factory {
            Some(f) => f(),
            None => Box::new(NoOpAgent),
        };

        let config = AgentConfig::merge(type_spec.config_defaults.clone(), spec.config.clone());
        let vfs = self
            .layout
            .agent_vfs(&spec.id)
            .map_err(|e| KernelError::SpawnFailure { agent_id: spec.id.clone(), source: e })?;
        let base = BaseAgentServices::new(spec.id.clone(), self.broker.clone(), vfs, config);
        let cancellation = base.cancellation_token();

        let ingress_topic = spec.ingress.as_deref().and_then(topic_of);
        let egress_topic = spec.egress.as_deref().and_then(topic_of);
        let runtime = AgentRuntime::new(AgentHandleAdapter(agent), base, ingress_topic, egress_topic);

        let cell_id = handle.cell_id.clone();
        let agent_id = spec.id.clone();
        let join = tokio::spawn(async move {
            if let Err(e) = runtime.run().await {
                tracing::error!(cell_id, agent_id, error = %e, "agent runtime exited with error");
            }
        });

        Ok(RunningAgent { cancellation, join: Some(join), child: None })
    }

    async fn launch_process(
        &self,
        _handle: &Arc<CellHandle>,
        spec: &CellAgentSpec,
        type_spec: &crate::models::AgentTypeSpec,
    ) -> Result<RunningAgent, KernelError> {
        let mut command = Command::new(&type_spec.binary);
        command
            .env("AGENT_ID", &spec.id)
            .env("AGENT_TYPE", &spec.agent_type)
            .env("AGENT_CONFIG", serde_json::to_string(&spec.config).unwrap_or_default())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| KernelError::SpawnFailure { agent_id: spec.id.clone(), source: e })?;

        // Cross-process readiness would need its own IPC transport, which is
        // out of scope; a spawned agent is considered ready once it survives
        // a short grace window without exiting.
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(KernelError::SpawnFailure {
                agent_id: spec.id.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("process exited immediately with {status}"),
                ),
            });
        }

        Ok(RunningAgent { cancellation: CancellationToken::new(), join: None, child: Some(child) })
    }

    async fn supervise(self: Arc<Self>, handle: Arc<CellHandle>) {
        let mut interval = tokio::time::interval(Duration::from_millis(
            handle.cell_config.orchestration.health_check_interval_ms,
        ));
        loop {
            tokio::select! {
                _ = handle.supervise_cancel.cancelled() => return,
                _ = interval.tick() => {}
            }

            let agent_ids: Vec<String> = handle.agents.iter().map(|e| e.key().clone()).collect();
            for agent_id in agent_ids {
                let alive = self.probe_agent(&handle, &agent_id);
                if alive {
                    continue;
                }
                let restart_count = self.bump_restart_count(&handle, &agent_id);
                if restart_count > handle.cell_config.orchestration.max_retries {
                    tracing::error!(cell_id = %handle.cell_id, agent_id, "restart budget exceeded, failing cell");
                    self.set_agent_status(&handle, &agent_id, AgentStatus::Failed);
                    let order = handle.dag.topological_sort().unwrap_or_default();
                    self.teardown(&handle, &order).await;
                    *handle.phase.lock().unwrap() = CellPhase::Failed;
                    *handle.ended_at.lock().unwrap() = Some(Utc::now().to_rfc3339());
                    self.emit(&handle.cell_id, CellEventKind::PhaseChanged { phase: CellPhase::Failed });
                    return;
                }
                self.set_agent_status(&handle, &agent_id, AgentStatus::Restarting);
                self.emit(&handle.cell_id, CellEventKind::AgentRestarted { agent_id: agent_id.clone(), attempt: restart_count });
                tokio::time::sleep(Duration::from_millis(handle.cell_config.orchestration.retry_delay_ms)).await;
                if self.start_agent_with_retry(&handle, &agent_id).await.is_err() {
                    tracing::error!(cell_id = %handle.cell_id, agent_id, "restart attempt failed");
                }
            }
        }
    }

    fn probe_agent(&self, handle: &Arc<CellHandle>, agent_id: &str) -> bool {
        let mut running = handle.running.lock().unwrap();
        match running.get_mut(agent_id) {
            Some(r) => {
                if let Some(join) = &r.join {
                    !join.is_finished()
                } else if let Some(child) = &mut r.child {
                    !matches!(child.try_wait(), Ok(Some(_)))
                } else {
                    true
                }
            }
            None => false,
        }
    }

    fn bump_restart_count(&self, handle: &Arc<CellHandle>, agent_id: &str) -> u32 {
        if let Some(mut entry) = handle.agents.get_mut(agent_id) {
            entry.restart_count += 1;
            entry.restart_count
        } else {
            0
        }
    }

    fn set_agent_status(&self, handle: &Arc<CellHandle>, agent_id: &str, status: AgentStatus) {
        if let Some(mut entry) = handle.agents.get_mut(agent_id) {
            entry.status = status;
        }
        self.emit(&handle.cell_id, CellEventKind::AgentStatusChanged { agent_id: agent_id.to_string(), status });
    }

    fn record_agent_error(&self, handle: &Arc<CellHandle>, agent_id: &str, error: &str) {
        if let Some(mut entry) = handle.agents.get_mut(agent_id) {
            entry.last_error = Some(error.to_string());
        }
    }

    /// Stops the cell: shutdown signal in reverse topological order, each
    /// agent gets `shutdown_timeout` before being force-killed.
    pub async fn stop_cell(&self, cell_id: &str) -> Result<(), KernelError> {
        let handle = self
            .cells
            .get(cell_id)
            .map(|h| h.value().clone())
            .ok_or_else(|| KernelError::CellNotFound(cell_id.to_string()))?;
        handle.supervise_cancel.cancel();
        *handle.phase.lock().unwrap() = CellPhase::Stopping;
        self.emit(cell_id, CellEventKind::PhaseChanged { phase: CellPhase::Stopping });

        let order = handle.dag.topological_sort().unwrap_or_default();
        self.teardown(&handle, &order).await;

        *handle.phase.lock().unwrap() = CellPhase::Stopped;
        *handle.ended_at.lock().unwrap() = Some(Utc::now().to_rfc3339());
        self.emit(cell_id, CellEventKind::PhaseChanged { phase: CellPhase::Stopped });
        Ok(())
    }

    async fn teardown(&self, handle: &Arc<CellHandle>, started_order: &[String]) {
        let shutdown_timeout = Duration::from_millis(handle.cell_config.orchestration.shutdown_timeout_ms);
        for agent_id in started_order.iter().rev() {
            let running = handle.running.lock().unwrap().remove(agent_id);
            let Some(mut running) = running else { continue };
            running.cancellation.cancel();

            if let Some(join) = running.join.take() {
                if tokio::time::timeout(shutdown_timeout, join).await.is_err() {
                    tracing::warn!(cell_id = %handle.cell_id, agent_id, "agent did not exit within shutdown_timeout");
                }
            }
            if let Some(mut child) = running.child.take() {
                match tokio::time::timeout(shutdown_timeout, child.wait()).await {
                    Ok(_) => {}
                    Err(_) => {
                        tracing::warn!(cell_id = %handle.cell_id, agent_id, "force-killing agent process past shutdown_timeout");
                        let _ = child.kill().await;
                    }
                }
            }
            self.set_agent_status(handle, agent_id, AgentStatus::Stopped);
        }
    }

    async fn fail_cell(&self, handle: &Arc<CellHandle>, started_order: &[String]) {
        self.teardown(handle, started_order).await;
        *handle.phase.lock().unwrap() = CellPhase::Failed;
        *handle.ended_at.lock().unwrap() = Some(Utc::now().to_rfc3339());
        self.emit(&handle.cell_id, CellEventKind::PhaseChanged { phase: CellPhase::Failed });
    }
}

fn topic_of(uri: &str) -> Option<String> {
    match config::parse_uri(uri)? {
        config::UriKind::Sub(t) | config::UriKind::Pub(t) | config::UriKind::Route(t) => Some(t),
        _ => None,
    }
}

/// An always-succeeds, no-op agent used when a pool declares an `operator:
/// call` agent type with no registered factory (e.g. during tests of the
/// orchestrator itself, independent of any concrete agent logic).
struct NoOpAgent;

#[async_trait]
impl Agent for NoOpAgent {
    async fn init(&mut self, _base: &BaseAgentServices) -> Result<(), AgentError> {
        Ok(())
    }

    async fn process_message(
        &mut self,
        _message: Message,
        _base: &BaseAgentServices,
    ) -> Result<Option<Message>, AgentError> {
        Ok(None)
    }

    async fn cleanup(&mut self, _base: &BaseAgentServices) {}
}

/// `Box<dyn Agent>` doesn't implement `Agent` itself; this newtype forwards
/// the trait through the box so `AgentRuntime<A: Agent>` can own one.
struct AgentHandleAdapter(Box<dyn Agent>);

#[async_trait]
impl Agent for AgentHandleAdapter {
    async fn init(&mut self, base: &BaseAgentServices) -> Result<(), AgentError> {
        self.0.init(base).await
    }

    async fn process_message(
        &mut self,
        message: Message,
        base: &BaseAgentServices,
    ) -> Result<Option<Message>, AgentError> {
        self.0.process_message(message, base).await
    }

    async fn cleanup(&mut self, base: &BaseAgentServices) {
        self.0.cleanup(base).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentTypeSpec, CellAgentSpec, OrchestrationConfig};
    use std::sync::Mutex as StdMutex;

    struct RecorderAgent {
        order: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Agent for RecorderAgent {
        async fn init(&mut self, base: &BaseAgentServices) -> Result<(), AgentError> {
            self.order.lock().unwrap().push(base.agent_id.clone());
            Ok(())
        }

        async fn process_message(
            &mut self,
            _message: Message,
            _base: &BaseAgentServices,
        ) -> Result<Option<Message>, AgentError> {
            Ok(None)
        }

        async fn cleanup(&mut self, _base: &BaseAgentServices) {}
    }

    fn agent_spec(id: &str, deps: &[&str]) -> CellAgentSpec {
        CellAgentSpec {
            id: id.to_string(),
            agent_type: "recorder".to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            ingress: None,
            egress: None,
            config: Default::default(),
        }
    }

    #[tokio::test]
    async fn cell_starts_agents_in_topological_order() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = CellOrchestrator::new(dir.path(), "test-project");

        let order: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let factory_order = order.clone();
        orchestrator.register_agent_factory(
            "recorder",
            Arc::new(move || -> Box<dyn Agent> {
                Box::new(RecorderAgent { order: factory_order.clone() })
            }),
        );

        let pool = PoolConfig {
            agent_types: vec![AgentTypeSpec {
                agent_type: "recorder".to_string(),
                binary: String::new(),
                operator: Operator::Call,
                capabilities: Vec::new(),
                config_defaults: Default::default(),
            }],
        };
        let cell = CellConfig {
            id: "demo".to_string(),
            description: String::new(),
            debug: false,
            orchestration: OrchestrationConfig::default(),
            agents: vec![
                agent_spec("a", &[]),
                agent_spec("b", &["a"]),
                agent_spec("c", &["b"]),
            ],
        };

        let cell_id = orchestrator.start_cell(pool, cell).unwrap();

        let mut state = None;
        for _ in 0..100 {
            let s = orchestrator.get_state(&cell_id).unwrap();
            let done = matches!(s.phase, CellPhase::Running | CellPhase::Failed);
            state = Some(s);
            if done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let state = state.unwrap();
        assert_eq!(state.phase, CellPhase::Running);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }
}
