//! Primary-entity + index writes, one KV transaction per mutation.
//!
//! Every `*_in_tx` function reuses a caller-supplied [`raro_kv::WriteTxn`] so
//! the transaction manager can compose graph writes with plain KV writes in
//! a single commit. The self-contained wrappers in [`crate::store`] open
//! their own transaction and delegate here.

use std::collections::HashMap;

use raro_kv::{ReadTxn, WriteTxn};
use serde_json::Value;

use crate::error::GraphError;
use crate::keys;
use crate::model::{now, stringify_prop, Edge, Vertex};

type Result<T> = std::result::Result<T, GraphError>;

pub fn create_vertex_in_tx(
    txn: &WriteTxn,
    id: &str,
    vtype: &str,
    properties: HashMap<String, Value>,
) -> Result<Vertex> {
    let key = keys::vertex_key(id);
    if txn.get(&key)?.is_some() {
        return Err(GraphError::DuplicateVertex(id.to_string()));
    }
    let ts = now();
    let vertex = Vertex {
        id: id.to_string(),
        vtype: vtype.to_string(),
        properties,
        created_at: ts,
        updated_at: ts,
        version: 1,
    };
    write_vertex_record(txn, &vertex)?;
    txn.set(&keys::idx_vertex_type(vtype, id), b"")?;
    for (name, value) in &vertex.properties {
        txn.set(&keys::idx_prop(name, &stringify_prop(value), id), b"")?;
    }
    Ok(vertex)
}

pub fn get_vertex_in_tx(txn: &WriteTxn, id: &str) -> Result<Option<Vertex>> {
    match txn.get(&keys::vertex_key(id))? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Same lookup, against a read-only snapshot — for callers (e.g. the
/// transaction manager's `ReadCommitted` path) that never open a `WriteTxn`.
pub fn get_vertex_read(txn: &ReadTxn, id: &str) -> Result<Option<Vertex>> {
    match txn.get(&keys::vertex_key(id))? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub fn update_vertex_in_tx(
    txn: &WriteTxn,
    id: &str,
    patch: HashMap<String, Value>,
) -> Result<Vertex> {
    let mut vertex = get_vertex_in_tx(txn, id)?
        .ok_or_else(|| GraphError::VertexNotFound(id.to_string()))?;

    for (name, old_value) in &vertex.properties {
        if patch.contains_key(name) {
            txn.delete(&keys::idx_prop(name, &stringify_prop(old_value), id))?;
        }
    }
    for (name, value) in &patch {
        vertex.properties.insert(name.clone(), value.clone());
        txn.set(&keys::idx_prop(name, &stringify_prop(value), id), b"")?;
    }

    vertex.updated_at = now();
    vertex.version += 1;
    write_vertex_record(txn, &vertex)?;
    Ok(vertex)
}

pub fn delete_vertex_in_tx(txn: &WriteTxn, id: &str) -> Result<()> {
    let vertex = get_vertex_in_tx(txn, id)?
        .ok_or_else(|| GraphError::VertexNotFound(id.to_string()))?;

    let incident = count_prefix(txn, &keys::idx_out_prefix(id))?
        + count_prefix(txn, &keys::idx_in_prefix(id))?;
    if incident > 0 {
        return Err(GraphError::ReferentialIntegrity(id.to_string(), incident));
    }

    txn.delete(&keys::vertex_key(id))?;
    txn.delete(&keys::idx_vertex_type(&vertex.vtype, id))?;
    for (name, value) in &vertex.properties {
        txn.delete(&keys::idx_prop(name, &stringify_prop(value), id))?;
    }
    Ok(())
}

pub fn create_edge_in_tx(
    txn: &WriteTxn,
    id: &str,
    etype: &str,
    from: &str,
    to: &str,
    weight: f64,
    properties: HashMap<String, Value>,
) -> Result<Edge> {
    if get_vertex_in_tx(txn, from)?.is_none() {
        return Err(GraphError::VertexNotFound(from.to_string()));
    }
    if get_vertex_in_tx(txn, to)?.is_none() {
        return Err(GraphError::VertexNotFound(to.to_string()));
    }
    let key = keys::edge_key(id);
    if txn.get(&key)?.is_some() {
        return Err(GraphError::DuplicateEdge(id.to_string()));
    }

    let ts = now();
    let edge = Edge {
        id: id.to_string(),
        etype: etype.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        weight,
        properties,
        created_at: ts,
        updated_at: ts,
        version: 1,
    };
    write_edge_record(txn, &edge)?;
    txn.set(&keys::idx_edge_type(etype, id), b"")?;
    txn.set(&keys::idx_out(from, id), etype.as_bytes())?;
    txn.set(&keys::idx_in(to, id), etype.as_bytes())?;
    for (name, value) in &edge.properties {
        txn.set(&keys::idx_prop(name, &stringify_prop(value), id), b"")?;
    }
    Ok(edge)
}

pub fn get_edge_in_tx(txn: &WriteTxn, id: &str) -> Result<Option<Edge>> {
    match txn.get(&keys::edge_key(id))? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Same lookup, against a read-only snapshot — see [`get_vertex_read`].
pub fn get_edge_read(txn: &ReadTxn, id: &str) -> Result<Option<Edge>> {
    match txn.get(&keys::edge_key(id))? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Tolerant of missing index entries (they may have been pruned already);
/// strict only on the primary record being present.
pub fn delete_edge_in_tx(txn: &WriteTxn, id: &str) -> Result<()> {
    let edge = get_edge_in_tx(txn, id)?.ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))?;

    txn.delete(&keys::edge_key(id))?;
    let _ = txn.delete(&keys::idx_edge_type(&edge.etype, id));
    let _ = txn.delete(&keys::idx_out(&edge.from, id));
    let _ = txn.delete(&keys::idx_in(&edge.to, id));
    for (name, value) in &edge.properties {
        let _ = txn.delete(&keys::idx_prop(name, &stringify_prop(value), id));
    }
    Ok(())
}

fn write_vertex_record(txn: &WriteTxn, vertex: &Vertex) -> Result<()> {
    let bytes = serde_json::to_vec(vertex)?;
    txn.set(&keys::vertex_key(&vertex.id), &bytes)?;
    Ok(())
}

fn write_edge_record(txn: &WriteTxn, edge: &Edge) -> Result<()> {
    let bytes = serde_json::to_vec(edge)?;
    txn.set(&keys::edge_key(&edge.id), &bytes)?;
    Ok(())
}

fn count_prefix(txn: &WriteTxn, prefix: &[u8]) -> Result<usize> {
    Ok(txn.scan_prefix(prefix)?.len())
}
