// crates/raro-graph/src/lib.rs
// Purpose: CRUD/index manager and graph store façade atop raro-kv.
// Architecture: crud.rs encodes entities + indexes inside one KV transaction;
//   store.rs is the type-safe, traversal-capable façade callers use.
// Dependencies: raro-kv, serde_json, chrono

pub mod crud;
mod error;
pub mod keys;
mod model;
mod store;

pub use error::GraphError;
pub use model::{Direction, Edge, GraphStats, Vertex};
pub use store::GraphStore;

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;
    use raro_kv::KvStore;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn temp_store() -> (tempfile::TempDir, GraphStore) {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(KvStore::open(dir.path().join("graph.redb")).unwrap());
        (dir, GraphStore::new(kv))
    }

    #[test]
    fn vertex_and_edge_crud_with_referential_integrity() {
        let (_dir, store) = temp_store();
        let mut alice_props = HashMap::new();
        alice_props.insert("name".to_string(), serde_json::json!("Alice"));
        store.add_vertex("user:1", "User", alice_props).unwrap();
        store.add_vertex("user:2", "User", HashMap::new()).unwrap();
        store
            .add_edge("f:1:2", "follows", "user:1", "user:2", HashMap::new())
            .unwrap();

        assert_eq!(store.get_vertices_by_type("User", -1).unwrap().len(), 2);
        assert_eq!(store.get_edges_by_type("follows", -1).unwrap().len(), 1);

        let err = store.delete_vertex("user:1").unwrap_err();
        assert!(matches!(err, GraphError::ReferentialIntegrity(_, _)));

        store.delete_edge("f:1:2").unwrap();
        store.delete_vertex("user:1").unwrap();
        assert_eq!(store.get_all_vertices(-1).unwrap().len(), 1);
    }

    #[test]
    fn bfs_respects_depth_limit() {
        let (_dir, store) = temp_store();
        for id in ["a", "b", "c", "d", "e"] {
            store.add_vertex(id, "node", HashMap::new()).unwrap();
        }
        let chain = [("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")];
        for (i, (from, to)) in chain.iter().enumerate() {
            store
                .add_edge(&format!("e{i}"), "next", from, to, HashMap::new())
                .unwrap();
        }

        let mut visited = Vec::new();
        store
            .traverse_bfs("a", Direction::Outgoing, 2, |id, depth| {
                visited.push((id.to_string(), depth));
                true
            })
            .unwrap();

        let ids: Vec<_> = visited.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(visited, vec![("a".to_string(), 0), ("b".to_string(), 1), ("c".to_string(), 2)]);
    }

    #[test]
    fn find_path_returns_none_without_error_for_missing_target() {
        let (_dir, store) = temp_store();
        store.add_vertex("a", "node", HashMap::new()).unwrap();
        assert_eq!(
            store.find_path("a", "ghost", Direction::Outgoing, -1).unwrap(),
            None
        );
    }
}
