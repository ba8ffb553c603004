// crates/raro-query/src/lib.rs
// Purpose: Fluent graph traversal DSL (builder, parser, executor).
// Architecture: parser.rs turns `g.step(args)...` text into a Query AST;
//   executor.rs runs it against a raro_graph::GraphStore.
// Dependencies: raro-graph, serde_json

mod ast;
mod error;
mod executor;
mod parser;

pub use ast::{Arg, Query, Step};
pub use error::QueryError;
pub use executor::{execute, QueryResult};
pub use parser::Parser;

pub type Result<T> = std::result::Result<T, QueryError>;

/// Parses and executes `source` in one call.
pub fn run(store: &raro_graph::GraphStore, source: &str) -> Result<QueryResult> {
    let query = Parser::new(source).parse()?;
    execute(store, &query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raro_kv::KvStore;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn seeded_store() -> (tempfile::TempDir, raro_graph::GraphStore) {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(KvStore::open(dir.path().join("q.redb")).unwrap());
        let store = raro_graph::GraphStore::new(kv);
        let mut alice = HashMap::new();
        alice.insert("name".to_string(), serde_json::json!("Alice"));
        store.add_vertex("user:1", "User", alice).unwrap();
        store.add_vertex("user:2", "User", HashMap::new()).unwrap();
        store
            .add_edge("f:1:2", "follows", "user:1", "user:2", HashMap::new())
            .unwrap();
        (dir, store)
    }

    #[test]
    fn count_matches_vertex_type() {
        let (_dir, store) = seeded_store();
        let result = run(&store, "g.V().hasLabel('User').count()").unwrap();
        assert_eq!(result.count, Some(2));
    }

    #[test]
    fn values_reflect_live_property_updates() {
        let (_dir, store) = seeded_store();
        let result = run(&store, "g.V('user:1').out('follows').values('name')").unwrap();
        assert_eq!(result.values, Some(vec![]));

        let mut patch = HashMap::new();
        patch.insert("name".to_string(), serde_json::json!("Bob"));
        store.update_vertex("user:2", patch).unwrap();

        let result = run(&store, "g.V('user:1').out('follows').values('name')").unwrap();
        assert_eq!(result.values, Some(vec![serde_json::json!("Bob")]));
    }

    #[test]
    fn rejects_queries_not_beginning_with_g() {
        let err = Parser::new("x.V()").parse().unwrap_err();
        assert!(matches!(err, QueryError::Parse { .. }));
    }
}
