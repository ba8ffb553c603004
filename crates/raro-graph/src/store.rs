use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use raro_kv::KvStore;
use serde_json::Value;

use crate::crud;
use crate::error::GraphError;
use crate::keys;
use crate::model::{Direction, Edge, GraphStats, Vertex};

type Result<T> = std::result::Result<T, GraphError>;

/// Type-safe façade over the CRUD/index layer, plus traversal primitives.
pub struct GraphStore {
    kv: Arc<KvStore>,
}

impl GraphStore {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    pub fn add_vertex(
        &self,
        id: &str,
        vtype: &str,
        properties: HashMap<String, Value>,
    ) -> Result<Vertex> {
        self.kv
            .update(|txn| crud::create_vertex_in_tx(txn, id, vtype, properties.clone()))
    }

    pub fn get_vertex(&self, id: &str) -> Result<Vertex> {
        let raw = self
            .kv
            .get(&keys::vertex_key(id))
            .map_err(GraphError::from)?
            .ok_or_else(|| GraphError::VertexNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn vertex_exists(&self, id: &str) -> Result<bool> {
        Ok(self.kv.exists(&keys::vertex_key(id)).map_err(GraphError::from)?)
    }

    pub fn update_vertex(&self, id: &str, patch: HashMap<String, Value>) -> Result<Vertex> {
        self.kv
            .update(|txn| crud::update_vertex_in_tx(txn, id, patch.clone()))
    }

    pub fn delete_vertex(&self, id: &str) -> Result<()> {
        self.kv.update(|txn| crud::delete_vertex_in_tx(txn, id))
    }

    pub fn add_edge(
        &self,
        id: &str,
        etype: &str,
        from: &str,
        to: &str,
        properties: HashMap<String, Value>,
    ) -> Result<Edge> {
        self.add_edge_weighted(id, etype, from, to, 1.0, properties)
    }

    pub fn add_edge_weighted(
        &self,
        id: &str,
        etype: &str,
        from: &str,
        to: &str,
        weight: f64,
        properties: HashMap<String, Value>,
    ) -> Result<Edge> {
        self.kv.update(|txn| {
            crud::create_edge_in_tx(txn, id, etype, from, to, weight, properties.clone())
        })
    }

    pub fn get_edge(&self, id: &str) -> Result<Edge> {
        let raw = self
            .kv
            .get(&keys::edge_key(id))
            .map_err(GraphError::from)?
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn edge_exists(&self, id: &str) -> Result<bool> {
        Ok(self.kv.exists(&keys::edge_key(id)).map_err(GraphError::from)?)
    }

    pub fn delete_edge(&self, id: &str) -> Result<()> {
        self.kv.update(|txn| crud::delete_edge_in_tx(txn, id))
    }

    pub fn get_vertices_by_type(&self, vtype: &str, limit: i64) -> Result<Vec<Vertex>> {
        let ids = self.scan_index_ids(&keys::idx_vertex_type_prefix(vtype), limit)?;
        ids.iter().map(|id| self.get_vertex(id)).collect()
    }

    pub fn get_edges_by_type(&self, etype: &str, limit: i64) -> Result<Vec<Edge>> {
        let ids = self.scan_index_ids(&keys::idx_edge_type_prefix(etype), limit)?;
        ids.iter().map(|id| self.get_edge(id)).collect()
    }

    pub fn get_all_vertices(&self, limit: i64) -> Result<Vec<Vertex>> {
        let lim = to_scan_limit(limit);
        let entries = self
            .kv
            .scan(keys::ALL_VERTICES_PREFIX, lim)
            .map_err(GraphError::from)?;
        entries
            .into_iter()
            .map(|(_, v)| Ok(serde_json::from_slice(&v)?))
            .collect()
    }

    pub fn get_all_edges(&self, limit: i64) -> Result<Vec<Edge>> {
        let lim = to_scan_limit(limit);
        let entries = self
            .kv
            .scan(keys::ALL_EDGES_PREFIX, lim)
            .map_err(GraphError::from)?;
        entries
            .into_iter()
            .map(|(_, v)| Ok(serde_json::from_slice(&v)?))
            .collect()
    }

    pub fn get_outgoing_edges(&self, vertex_id: &str) -> Result<Vec<Edge>> {
        let prefix = keys::idx_out_prefix(vertex_id);
        let entries = self.kv.scan(&prefix, None).map_err(GraphError::from)?;
        entries
            .into_iter()
            .filter_map(|(k, _)| keys::strip_prefix(&k, &prefix))
            .map(|edge_id| self.get_edge(&edge_id))
            .collect()
    }

    pub fn get_incoming_edges(&self, vertex_id: &str) -> Result<Vec<Edge>> {
        let prefix = keys::idx_in_prefix(vertex_id);
        let entries = self.kv.scan(&prefix, None).map_err(GraphError::from)?;
        entries
            .into_iter()
            .filter_map(|(k, _)| keys::strip_prefix(&k, &prefix))
            .map(|edge_id| self.get_edge(&edge_id))
            .collect()
    }

    /// Neighboring vertex ids, deduplicated; relative order unspecified.
    pub fn get_neighbors(&self, vertex_id: &str, direction: Direction) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            for edge in self.get_outgoing_edges(vertex_id)? {
                if seen.insert(edge.to.clone()) {
                    out.push(edge.to);
                }
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            for edge in self.get_incoming_edges(vertex_id)? {
                if seen.insert(edge.from.clone()) {
                    out.push(edge.from);
                }
            }
        }
        Ok(out)
    }

    /// Layer-by-layer BFS; `visitor` returns `false` to stop early.
    /// `max_depth < 0` means unbounded.
    pub fn traverse_bfs(
        &self,
        start: &str,
        direction: Direction,
        max_depth: i64,
        mut visitor: impl FnMut(&str, u64) -> bool,
    ) -> Result<()> {
        if !self.vertex_exists(start)? {
            return Err(GraphError::VertexNotFound(start.to_string()));
        }
        let mut visited = HashSet::new();
        visited.insert(start.to_string());
        let mut queue = VecDeque::new();
        queue.push_back((start.to_string(), 0u64));

        while let Some((id, depth)) = queue.pop_front() {
            if !visitor(&id, depth) {
                return Ok(());
            }
            if max_depth >= 0 && depth as i64 >= max_depth {
                continue;
            }
            for neighbor in self.get_neighbors(&id, direction)? {
                if visited.insert(neighbor.clone()) {
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        Ok(())
    }

    /// Recursive pre-order DFS; `visitor` returns `false` to stop early.
    pub fn traverse_dfs(
        &self,
        start: &str,
        direction: Direction,
        max_depth: i64,
        visitor: &mut dyn FnMut(&str, u64) -> bool,
    ) -> Result<()> {
        if !self.vertex_exists(start)? {
            return Err(GraphError::VertexNotFound(start.to_string()));
        }
        let mut visited = HashSet::new();
        self.dfs_inner(start, direction, max_depth, 0, &mut visited, visitor)?;
        Ok(())
    }

    fn dfs_inner(
        &self,
        current: &str,
        direction: Direction,
        max_depth: i64,
        depth: u64,
        visited: &mut HashSet<String>,
        visitor: &mut dyn FnMut(&str, u64) -> bool,
    ) -> Result<bool> {
        visited.insert(current.to_string());
        if !visitor(current, depth) {
            return Ok(false);
        }
        if max_depth >= 0 && depth as i64 >= max_depth {
            return Ok(true);
        }
        for neighbor in self.get_neighbors(current, direction)? {
            if !visited.contains(&neighbor)
                && !self.dfs_inner(&neighbor, direction, max_depth, depth + 1, visited, visitor)?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `[from]` if `from == to`. `None` if `to` doesn't exist or no path is
    /// found within `max_depth`. Fails only if `from` doesn't exist.
    pub fn find_path(
        &self,
        from: &str,
        to: &str,
        direction: Direction,
        max_depth: i64,
    ) -> Result<Option<Vec<String>>> {
        if !self.vertex_exists(from)? {
            return Err(GraphError::VertexNotFound(from.to_string()));
        }
        if from == to {
            return Ok(Some(vec![from.to_string()]));
        }
        if !self.vertex_exists(to)? {
            return Ok(None);
        }

        let mut visited = HashSet::new();
        visited.insert(from.to_string());
        let mut queue = VecDeque::new();
        queue.push_back((from.to_string(), 0u64));
        let mut parents: HashMap<String, String> = HashMap::new();

        while let Some((id, depth)) = queue.pop_front() {
            if id == to {
                return Ok(Some(reconstruct_path(&parents, from, to)));
            }
            if max_depth >= 0 && depth as i64 >= max_depth {
                continue;
            }
            for neighbor in self.get_neighbors(&id, direction)? {
                if visited.insert(neighbor.clone()) {
                    parents.insert(neighbor.clone(), id.clone());
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        Ok(None)
    }

    pub fn batch_add_vertices(
        &self,
        vertices: Vec<(String, String, HashMap<String, Value>)>,
    ) -> Result<Vec<Vertex>> {
        vertices
            .into_iter()
            .map(|(id, vtype, props)| self.add_vertex(&id, &vtype, props))
            .collect()
    }

    pub fn batch_add_edges(
        &self,
        edges: Vec<(String, String, String, String, HashMap<String, Value>)>,
    ) -> Result<Vec<Edge>> {
        edges
            .into_iter()
            .map(|(id, etype, from, to, props)| self.add_edge(&id, &etype, &from, &to, props))
            .collect()
    }

    pub fn get_stats(&self) -> Result<GraphStats> {
        let vertices = self.get_all_vertices(-1)?;
        let edges = self.get_all_edges(-1)?;
        let info = self.kv.info().map_err(GraphError::from)?;

        let mut vertex_types: Vec<String> = vertices.iter().map(|v| v.vtype.clone()).collect();
        vertex_types.sort();
        vertex_types.dedup();
        let mut edge_types: Vec<String> = edges.iter().map(|e| e.etype.clone()).collect();
        edge_types.sort();
        edge_types.dedup();

        let vertex_bytes: u64 = vertices
            .iter()
            .map(|v| serde_json::to_vec(v).map(|b| b.len() as u64).unwrap_or(0))
            .sum();
        let edge_bytes: u64 = edges
            .iter()
            .map(|e| serde_json::to_vec(e).map(|b| b.len() as u64).unwrap_or(0))
            .sum();

        Ok(GraphStats {
            vertex_count: vertices.len() as u64,
            edge_count: edges.len() as u64,
            vertex_types,
            edge_types,
            total_size: vertex_bytes + edge_bytes,
            index_count: info.entry_count.saturating_sub(vertices.len() as u64 + edges.len() as u64),
            avg_vertex_size: avg(vertex_bytes, vertices.len()),
            avg_edge_size: avg(edge_bytes, edges.len()),
            last_access: chrono::Utc::now().timestamp_millis(),
        })
    }

    fn scan_index_ids(&self, prefix: &[u8], limit: i64) -> Result<Vec<String>> {
        let lim = to_scan_limit(limit);
        let entries = self.kv.scan(prefix, lim).map_err(GraphError::from)?;
        Ok(entries
            .into_iter()
            .filter_map(|(k, _)| keys::strip_prefix(&k, prefix))
            .collect())
    }
}

fn avg(total: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

fn to_scan_limit(limit: i64) -> Option<usize> {
    if limit <= 0 {
        None
    } else {
        Some(limit as usize)
    }
}

fn reconstruct_path(parents: &HashMap<String, String>, from: &str, to: &str) -> Vec<String> {
    let mut path = vec![to.to_string()];
    let mut current = to;
    while current != from {
        let parent = &parents[current];
        path.push(parent.clone());
        current = parent;
    }
    path.reverse();
    path
}
