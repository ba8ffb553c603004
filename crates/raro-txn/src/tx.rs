use std::collections::HashMap;
use std::sync::Arc;

use raro_graph::{crud, Direction, Edge, Vertex};
use raro_kv::{ReadTxn, WriteTxn};
use serde_json::Value;
use uuid::Uuid;

use crate::config::TransactionConfig;
use crate::control::TxControl;
use crate::error::TxnError;
use crate::state::TxState;
use crate::stats::TxStats;

type Result<T> = std::result::Result<T, TxnError>;

enum Inner {
    Write(WriteTxn),
    Read(ReadTxn),
}

/// One ACID scope unifying KV and graph operations, with an op log that
/// backs savepoints. Obtained from [`crate::TransactionManager::begin`] or
/// one of the `execute*` helpers, never constructed directly.
pub struct GraphTx {
    id: Uuid,
    config: TransactionConfig,
    state: TxState,
    inner: Option<Inner>,
    op_log: Vec<String>,
    savepoints: HashMap<String, usize>,
    control: Arc<TxControl>,
}

impl GraphTx {
    pub(crate) fn new(
        id: Uuid,
        config: TransactionConfig,
        inner_kv: raro_kv::Transaction,
        control: Arc<TxControl>,
    ) -> Self {
        let inner = match inner_kv {
            raro_kv::Transaction::Write(w) => Inner::Write(w),
            raro_kv::Transaction::Read(r) => Inner::Read(r),
        };
        Self {
            id,
            config,
            state: TxState::Active,
            inner: Some(inner),
            op_log: Vec::new(),
            savepoints: HashMap::new(),
            control,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn get_state(&self) -> TxState {
        self.state
    }

    pub fn get_stats(&self) -> TxStats {
        self.control.snapshot_stats()
    }

    fn guard_active(&self) -> Result<()> {
        if self.control.is_abort_requested() {
            return Err(TxnError::AbortedByManager);
        }
        if self.state != TxState::Active {
            return Err(TxnError::TxNotActive);
        }
        Ok(())
    }

    fn guard_writable(&self) -> Result<()> {
        self.guard_active()?;
        if self.config.read_only {
            return Err(TxnError::ReadOnlyViolation);
        }
        Ok(())
    }

    fn write_txn(&self) -> Result<&WriteTxn> {
        match self.inner.as_ref() {
            Some(Inner::Write(w)) => Ok(w),
            _ => Err(TxnError::ReadOnlyViolation),
        }
    }

    fn log(&mut self, entry: impl Into<String>) {
        self.op_log.push(entry.into());
        self.control.stats.lock().unwrap().record_write(0);
    }

    pub fn kv_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.guard_active()?;
        let result = match self.inner.as_ref().unwrap() {
            Inner::Write(w) => w.get(key)?,
            Inner::Read(r) => r.get(key)?,
        };
        let bytes = result.as_ref().map(|v| v.len()).unwrap_or(0);
        self.control.stats.lock().unwrap().record_read(bytes);
        Ok(result)
    }

    pub fn kv_set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.guard_writable()?;
        self.write_txn()?.set(key, value)?;
        self.control.stats.lock().unwrap().record_write(value.len());
        self.log(format!("kv_set:{}", String::from_utf8_lossy(key)));
        Ok(())
    }

    pub fn kv_delete(&mut self, key: &[u8]) -> Result<()> {
        self.guard_writable()?;
        self.write_txn()?.delete(key)?;
        self.log(format!("kv_delete:{}", String::from_utf8_lossy(key)));
        Ok(())
    }

    pub fn add_vertex(
        &mut self,
        id: &str,
        vtype: &str,
        properties: HashMap<String, Value>,
    ) -> Result<Vertex> {
        self.guard_writable()?;
        let vertex = crud::create_vertex_in_tx(self.write_txn()?, id, vtype, properties)?;
        self.log(format!("add_vertex:{id}"));
        Ok(vertex)
    }

    pub fn get_vertex(&self, id: &str) -> Result<Option<Vertex>> {
        self.guard_active()?;
        let vertex = match self.inner.as_ref().unwrap() {
            Inner::Write(w) => crud::get_vertex_in_tx(w, id)?,
            Inner::Read(r) => crud::get_vertex_read(r, id)?,
        };
        Ok(vertex)
    }

    pub fn update_vertex(&mut self, id: &str, patch: HashMap<String, Value>) -> Result<Vertex> {
        self.guard_writable()?;
        let vertex = crud::update_vertex_in_tx(self.write_txn()?, id, patch)?;
        self.log(format!("update_vertex:{id}"));
        Ok(vertex)
    }

    pub fn delete_vertex(&mut self, id: &str) -> Result<()> {
        self.guard_writable()?;
        crud::delete_vertex_in_tx(self.write_txn()?, id)?;
        self.log(format!("delete_vertex:{id}"));
        Ok(())
    }

    pub fn add_edge(
        &mut self,
        id: &str,
        etype: &str,
        from: &str,
        to: &str,
        weight: f64,
        properties: HashMap<String, Value>,
    ) -> Result<Edge> {
        self.guard_writable()?;
        let edge =
            crud::create_edge_in_tx(self.write_txn()?, id, etype, from, to, weight, properties)?;
        self.log(format!("add_edge:{id}"));
        Ok(edge)
    }

    pub fn get_edge(&self, id: &str) -> Result<Option<Edge>> {
        self.guard_active()?;
        let edge = match self.inner.as_ref().unwrap() {
            Inner::Write(w) => crud::get_edge_in_tx(w, id)?,
            Inner::Read(r) => crud::get_edge_read(r, id)?,
        };
        Ok(edge)
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<()> {
        self.guard_writable()?;
        crud::delete_edge_in_tx(self.write_txn()?, id)?;
        self.log(format!("delete_edge:{id}"));
        Ok(())
    }

    /// Records a named marker into the op log.
    pub fn savepoint(&mut self, name: &str) -> Result<()> {
        self.guard_active()?;
        self.savepoints.insert(name.to_string(), self.op_log.len());
        Ok(())
    }

    /// Logically discards operations recorded after the savepoint. The
    /// built-in engine does not replay inverse ops against the KV store;
    /// it relies on the outer `rollback()` to undo effects. Truncating the
    /// log here only affects what `get_stats`-adjacent introspection and a
    /// fuller implementation's replay would see.
    pub fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.guard_active()?;
        let mark = *self
            .savepoints
            .get(name)
            .ok_or_else(|| TxnError::SavepointNotFound(name.to_string()))?;
        self.op_log.truncate(mark);
        tracing::warn!(
            tx_id = %self.id,
            savepoint = name,
            "rollback_to_savepoint only discards the in-memory op log; KV effects are not reversed"
        );
        Ok(())
    }

    pub fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.guard_active()?;
        self.savepoints
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TxnError::SavepointNotFound(name.to_string()))
    }

    pub fn commit(mut self) -> Result<()> {
        self.guard_active()?;
        self.state = TxState::Committing;
        let commit_result = match self.inner.take() {
            Some(Inner::Write(w)) => w.commit().map_err(TxnError::from),
            Some(Inner::Read(_)) | None => Ok(()),
        };
        self.state = match &commit_result {
            Ok(()) => TxState::Committed,
            Err(_) => TxState::Aborted,
        };
        commit_result
    }

    pub fn rollback(mut self) {
        if let Some(Inner::Write(w)) = self.inner.take() {
            w.rollback();
        }
        self.state = TxState::RolledBack;
    }
}
