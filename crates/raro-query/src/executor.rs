use std::collections::HashSet;

use raro_graph::{Direction, Edge, GraphStore, Vertex};
use serde_json::Value;

use crate::ast::{Query, Step};
use crate::error::QueryError;

type Result<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Default)]
pub struct QueryResult {
    pub vertices: Option<Vec<Vertex>>,
    pub edges: Option<Vec<Edge>>,
    pub values: Option<Vec<Value>>,
    pub count: Option<i64>,
}

enum State {
    Vertices(Vec<Vertex>),
    Edges(Vec<Edge>),
    Values(Vec<Value>),
    Count(i64),
}

/// Runs a parsed [`Query`] against a [`GraphStore`]. Exactly one of
/// [`QueryResult`]'s fields (plus `count`, populated alongside `values`
/// when the terminal step is `count()`) is set on return.
pub fn execute(store: &GraphStore, query: &Query) -> Result<QueryResult> {
    let mut state = State::Vertices(Vec::new());
    for step in &query.steps {
        state = apply_step(store, state, step)?;
    }
    Ok(to_result(state))
}

fn apply_step(store: &GraphStore, state: State, step: &Step) -> Result<State> {
    match step {
        Step::V(ids) => Ok(State::Vertices(load_vertices(store, ids)?)),
        Step::E(ids) => Ok(State::Edges(load_edges(store, ids)?)),
        Step::HasLabel(labels) => match state {
            State::Vertices(vs) => Ok(State::Vertices(
                vs.into_iter().filter(|v| labels.contains(&v.vtype)).collect(),
            )),
            State::Edges(es) => Ok(State::Edges(
                es.into_iter().filter(|e| labels.contains(&e.etype)).collect(),
            )),
            _ => Err(invalid("hasLabel")),
        },
        Step::Has(name, expected) => match state {
            State::Vertices(vs) => Ok(State::Vertices(
                vs.into_iter().filter(|v| has_prop(&v.properties, name, expected)).collect(),
            )),
            State::Edges(es) => Ok(State::Edges(
                es.into_iter().filter(|e| has_prop(&e.properties, name, expected)).collect(),
            )),
            _ => Err(invalid("has")),
        },
        Step::Out(labels) => match state {
            State::Vertices(vs) => Ok(State::Vertices(traverse(store, &vs, Direction::Outgoing, labels)?)),
            _ => Err(invalid("out")),
        },
        Step::In(labels) => match state {
            State::Vertices(vs) => Ok(State::Vertices(traverse(store, &vs, Direction::Incoming, labels)?)),
            _ => Err(invalid("in")),
        },
        Step::Both(labels) => match state {
            State::Vertices(vs) => Ok(State::Vertices(traverse(store, &vs, Direction::Both, labels)?)),
            _ => Err(invalid("both")),
        },
        Step::Values(props) => match state {
            State::Vertices(vs) => Ok(State::Values(extract_values(
                vs.iter().map(|v| &v.properties),
                props,
            ))),
            State::Edges(es) => Ok(State::Values(extract_values(
                es.iter().map(|e| &e.properties),
                props,
            ))),
            _ => Err(invalid("values")),
        },
        Step::Count => Ok(State::Count(state_len(&state) as i64)),
        Step::Limit(n) => Ok(limit_state(state, *n)),
    }
}

fn load_vertices(store: &GraphStore, ids: &[String]) -> Result<Vec<Vertex>> {
    if ids.is_empty() {
        return Ok(store.get_all_vertices(-1)?);
    }
    Ok(ids.iter().filter_map(|id| store.get_vertex(id).ok()).collect())
}

fn load_edges(store: &GraphStore, ids: &[String]) -> Result<Vec<Edge>> {
    if ids.is_empty() {
        return Ok(store.get_all_edges(-1)?);
    }
    Ok(ids.iter().filter_map(|id| store.get_edge(id).ok()).collect())
}

fn has_prop(
    properties: &std::collections::HashMap<String, Value>,
    name: &str,
    expected: &Option<Value>,
) -> bool {
    match properties.get(name) {
        None => false,
        Some(value) => match expected {
            None => true,
            Some(expected) => stringify(value) == stringify(expected),
        },
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn traverse(
    store: &GraphStore,
    vertices: &[Vertex],
    direction: Direction,
    labels: &[String],
) -> Result<Vec<Vertex>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for vertex in vertices {
        let edges = match direction {
            Direction::Outgoing => store.get_outgoing_edges(&vertex.id)?,
            Direction::Incoming => store.get_incoming_edges(&vertex.id)?,
            Direction::Both => {
                let mut both = store.get_outgoing_edges(&vertex.id)?;
                both.extend(store.get_incoming_edges(&vertex.id)?);
                both
            }
        };
        for edge in edges {
            if !labels.is_empty() && !labels.contains(&edge.etype) {
                continue;
            }
            let target = if edge.from == vertex.id { &edge.to } else { &edge.from };
            if seen.insert(target.clone()) {
                if let Ok(v) = store.get_vertex(target) {
                    out.push(v);
                }
            }
        }
    }
    Ok(out)
}

fn extract_values<'a>(
    entities: impl Iterator<Item = &'a std::collections::HashMap<String, Value>>,
    props: &[String],
) -> Vec<Value> {
    let mut out = Vec::new();
    for properties in entities {
        for name in props {
            if let Some(value) = properties.get(name) {
                out.push(value.clone());
            }
        }
    }
    out
}

fn state_len(state: &State) -> usize {
    match state {
        State::Vertices(v) => v.len(),
        State::Edges(e) => e.len(),
        State::Values(v) => v.len(),
        State::Count(_) => 1,
    }
}

fn limit_state(state: State, n: usize) -> State {
    match state {
        State::Vertices(mut v) => {
            v.truncate(n);
            State::Vertices(v)
        }
        State::Edges(mut e) => {
            e.truncate(n);
            State::Edges(e)
        }
        State::Values(mut v) => {
            v.truncate(n);
            State::Values(v)
        }
        State::Count(c) => State::Count(c),
    }
}

fn to_result(state: State) -> QueryResult {
    match state {
        State::Vertices(v) => QueryResult {
            vertices: Some(v),
            ..Default::default()
        },
        State::Edges(e) => QueryResult {
            edges: Some(e),
            ..Default::default()
        },
        State::Values(v) => QueryResult {
            values: Some(v),
            ..Default::default()
        },
        State::Count(n) => QueryResult {
            count: Some(n),
            values: Some(vec![Value::from(n)]),
            ..Default::default()
        },
    }
}

fn invalid(step: &str) -> QueryError {
    QueryError::InvalidStepInput {
        step: step.to_string(),
    }
}
