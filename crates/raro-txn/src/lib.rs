// crates/raro-txn/src/lib.rs
// Purpose: Unifies KV and graph operations inside one ACID scope, with a
//   per-transaction operation log backing savepoints.
// Architecture: GraphTx wraps a single raro_kv transaction and delegates
//   entity writes to raro_graph::crud's *_in_tx functions so every mutation
//   lands in the same KV commit. TransactionManager owns lifecycle, stats,
//   and forced-abort via a control cell shared with the issued GraphTx.
// Dependencies: raro-kv, raro-graph, dashmap, uuid

mod config;
mod control;
mod error;
mod events;
mod manager;
mod stats;
mod state;
mod tx;

pub use config::{IsolationLevel, TransactionConfig, TxContext};
pub use error::TxnError;
pub use events::{TxEvent, TxListener};
pub use manager::TransactionManager;
pub use stats::TxStats;
pub use state::TxState;
pub use tx::GraphTx;

pub type Result<T> = std::result::Result<T, TxnError>;

#[cfg(test)]
mod tests {
    use super::*;
    use raro_kv::KvStore;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn manager() -> (tempfile::TempDir, TransactionManager) {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(KvStore::open(dir.path().join("txn.redb")).unwrap());
        (dir, TransactionManager::new(kv))
    }

    #[test]
    fn rollback_hides_writes() {
        let (_dir, mgr) = manager();
        let result: Result<()> = mgr.execute(|tx| {
            tx.add_vertex("x", "T", HashMap::new())?;
            tx.kv_set(b"foo", b"bar")?;
            Err(TxnError::Backend("boom".to_string()))
        });
        assert!(result.is_err());

        let found = mgr.execute_read_only(|tx| Ok(tx.get_vertex("x")?)).unwrap();
        assert!(found.is_none());
        let kv_found = mgr.execute_read_only(|tx| Ok(tx.kv_get(b"foo")?)).unwrap();
        assert!(kv_found.is_none());
    }

    #[test]
    fn commit_persists_writes() {
        let (_dir, mgr) = manager();
        mgr.execute(|tx| {
            tx.add_vertex("y", "T", HashMap::new())?;
            Ok(())
        })
        .unwrap();

        let found = mgr.execute_read_only(|tx| Ok(tx.get_vertex("y")?)).unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn abort_transaction_marks_subsequent_ops_aborted() {
        let (_dir, mgr) = manager();
        let mut tx = mgr.begin(TransactionConfig::default()).unwrap();
        mgr.abort_transaction(tx.id());
        let err = tx.kv_set(b"k", b"v").unwrap_err();
        assert!(matches!(err, TxnError::AbortedByManager));
    }
}
