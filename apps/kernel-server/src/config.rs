// [[RARO]]/apps/kernel-server/src/config.rs
// Purpose: Pool/cell YAML parsing and the Load+Plan phases' validation.
// Architecture: Config layer
// Dependencies: serde_yaml, dag

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::dag::{DAGError, DAG};
use crate::models::{CellConfig, CellFile, PoolConfig, PoolFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse error at {location}: {message}")]
    ParseError { location: String, message: String },
    #[error("agent '{agent_id}' references unknown agent_type '{agent_type}'")]
    UnknownAgentType { agent_id: String, agent_type: String },
    #[error("duplicate agent id: {0}")]
    DuplicateAgentId(String),
    #[error("dependency cycle in cell agent graph: {0}")]
    DependencyCycle(String),
}

pub fn parse_pool(yaml: &str) -> Result<PoolConfig, ConfigError> {
    let file: PoolFile = serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError {
        location: e
            .location()
            .map(|l| format!("line {} column {}", l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string()),
        message: e.to_string(),
    })?;
    Ok(file.pool)
}

pub fn parse_cell(yaml: &str) -> Result<CellConfig, ConfigError> {
    let file: CellFile = serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError {
        location: e
            .location()
            .map(|l| format!("line {} column {}", l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string()),
        message: e.to_string(),
    })?;
    Ok(file.cell)
}

/// Ingress/egress URI scheme, per the grammar in the configuration surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriKind {
    Sub(String),
    Pub(String),
    File(String),
    Http(String),
    Route(String),
}

pub fn parse_uri(uri: &str) -> Option<UriKind> {
    let (scheme, rest) = uri.split_once(':')?;
    match scheme {
        "sub" => Some(UriKind::Sub(rest.to_string())),
        "pub" => Some(UriKind::Pub(rest.to_string())),
        "file" => Some(UriKind::File(rest.to_string())),
        "http" => Some(UriKind::Http(rest.to_string())),
        "route" => Some(UriKind::Route(rest.to_string())),
        _ => None,
    }
}

/// Load + Plan: validates the pool/cell pairing and returns the start-order
/// DAG. Agent ids are nodes; an edge `dep -> agent` models "dep must be
/// Ready before agent starts".
pub fn plan_cell(pool: &PoolConfig, cell: &CellConfig) -> Result<DAG, ConfigError> {
    let known_types: HashSet<&str> = pool.agent_types.iter().map(|t| t.agent_type.as_str()).collect();

    let mut seen_ids = HashSet::new();
    for agent in &cell.agents {
        if !seen_ids.insert(agent.id.as_str()) {
            return Err(ConfigError::DuplicateAgentId(agent.id.clone()));
        }
        if !known_types.contains(agent.agent_type.as_str()) {
            return Err(ConfigError::UnknownAgentType {
                agent_id: agent.id.clone(),
                agent_type: agent.agent_type.clone(),
            });
        }
    }

    let mut dag = DAG::new();
    for agent in &cell.agents {
        dag.add_node(agent.id.clone())
            .map_err(|e| ConfigError::DependencyCycle(e.to_string()))?;
    }
    for agent in &cell.agents {
        for dep in &agent.dependencies {
            dag.add_edge(dep.clone(), agent.id.clone())
                .map_err(|e| map_dag_error(e))?;
        }
    }
    // add_edge rejects a cycle-creating edge one at a time; a full
    // topological sort still confirms the whole graph is acyclic.
    dag.topological_sort()
        .map_err(|e| ConfigError::DependencyCycle(e.to_string()))?;

    warn_on_unresolved_topics(cell);

    Ok(dag)
}

fn map_dag_error(e: DAGError) -> ConfigError {
    match e {
        DAGError::CycleDetected => ConfigError::DependencyCycle(e.to_string()),
        DAGError::InvalidNode(n) => ConfigError::DependencyCycle(format!(
            "dependency '{n}' is not a declared agent in this cell"
        )),
        other => ConfigError::DependencyCycle(other.to_string()),
    }
}

/// Topics with no producer or no consumer are a configuration smell, not a
/// fatal error: the message would simply never be read, or never emitted.
fn warn_on_unresolved_topics(cell: &CellConfig) {
    let mut producers: HashMap<String, u32> = HashMap::new();
    let mut consumers: HashMap<String, u32> = HashMap::new();

    for agent in &cell.agents {
        if let Some(ingress) = &agent.ingress {
            if let Some(UriKind::Sub(topic) | UriKind::Route(topic)) = parse_uri(ingress) {
                *consumers.entry(topic).or_insert(0) += 1;
            }
        }
        if let Some(egress) = &agent.egress {
            if let Some(UriKind::Pub(topic) | UriKind::Route(topic)) = parse_uri(egress) {
                *producers.entry(topic).or_insert(0) += 1;
            }
        }
    }

    for topic in producers.keys() {
        if !consumers.contains_key(topic) {
            tracing::warn!(cell_id = %cell.id, topic = %topic, "topic has producers but no consumers");
        }
    }
    for topic in consumers.keys() {
        if !producers.contains_key(topic) {
            tracing::warn!(cell_id = %cell.id, topic = %topic, "topic has consumers but no producers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL_YAML: &str = r#"
pool:
  agent_types:
    - agent_type: echo
      binary: echo-agent
      operator: call
      capabilities: []
"#;

    const CELL_YAML: &str = r#"
cell:
  id: demo
  agents:
    - id: a
      agent_type: echo
      ingress: "sub:in"
      egress: "pub:mid"
    - id: b
      agent_type: echo
      dependencies: [a]
      ingress: "sub:mid"
      egress: "pub:out"
"#;

    #[test]
    fn parses_and_plans_a_valid_cell() {
        let pool = parse_pool(POOL_YAML).unwrap();
        let cell = parse_cell(CELL_YAML).unwrap();
        let dag = plan_cell(&pool, &cell).unwrap();
        assert_eq!(dag.topological_sort().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn rejects_unknown_agent_type() {
        let pool = parse_pool(POOL_YAML).unwrap();
        let mut cell = parse_cell(CELL_YAML).unwrap();
        cell.agents[0].agent_type = "ghost".to_string();
        let err = plan_cell(&pool, &cell).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAgentType { .. }));
    }

    #[test]
    fn rejects_duplicate_agent_ids() {
        let pool = parse_pool(POOL_YAML).unwrap();
        let mut cell = parse_cell(CELL_YAML).unwrap();
        cell.agents[1].id = "a".to_string();
        let err = plan_cell(&pool, &cell).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAgentId(_)));
    }

    #[test]
    fn rejects_dependency_cycles() {
        let pool = parse_pool(POOL_YAML).unwrap();
        let mut cell = parse_cell(CELL_YAML).unwrap();
        cell.agents[0].dependencies.push("b".to_string());
        let err = plan_cell(&pool, &cell).unwrap_err();
        assert!(matches!(err, ConfigError::DependencyCycle(_)));
    }
}
