use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::{TransactionConfig, TxContext};
use crate::control::TxControl;
use crate::error::TxnError;
use crate::events::{TxEvent, TxListener};
use crate::stats::TxStats;
use crate::tx::GraphTx;

type Result<T> = std::result::Result<T, TxnError>;

/// Coordinates [`GraphTx`] lifecycles against a shared [`raro_kv::KvStore`].
pub struct TransactionManager {
    kv: Arc<raro_kv::KvStore>,
    active: DashMap<Uuid, Arc<TxControl>>,
    default_config: RwLock<TransactionConfig>,
    listeners: RwLock<Vec<Arc<dyn TxListener>>>,
}

impl TransactionManager {
    pub fn new(kv: Arc<raro_kv::KvStore>) -> Self {
        Self {
            kv,
            active: DashMap::new(),
            default_config: RwLock::new(TransactionConfig::default()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn TxListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    fn emit(&self, event: TxEvent) {
        for listener in self.listeners.read().unwrap().iter() {
            listener.on_event(&event);
        }
    }

    pub fn set_default_config(&self, config: TransactionConfig) {
        *self.default_config.write().unwrap() = config;
    }

    pub fn begin(&self, config: TransactionConfig) -> Result<GraphTx> {
        self.begin_with_context(TxContext::default(), config)
    }

    pub fn begin_with_context(&self, ctx: TxContext, config: TransactionConfig) -> Result<GraphTx> {
        let id = Uuid::new_v4();
        let kv_txn = self
            .kv
            .new_transaction(!config.read_only)
            .map_err(TxnError::from)?;
        let control = Arc::new(TxControl::new());
        self.active.insert(id, Arc::clone(&control));
        self.emit(TxEvent::Begin { tx_id: id });
        tracing::debug!(
            tx_id = %id,
            principal = ?ctx.principal,
            correlation_id = ?ctx.correlation_id,
            "transaction begin"
        );
        Ok(GraphTx::new(id, config, kv_txn, control))
    }

    /// Runs `f` inside a transaction built from [`Self::set_default_config`]'s
    /// current default, committing on success and rolling back on error.
    pub fn execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut GraphTx) -> Result<R>,
    {
        let config = self.default_config.read().unwrap().clone();
        self.execute_with_config(config, f)
    }

    pub fn execute_with_config<F, R>(&self, config: TransactionConfig, f: F) -> Result<R>
    where
        F: FnOnce(&mut GraphTx) -> Result<R>,
    {
        let mut tx = self.begin(config)?;
        let id = tx.id();
        match f(&mut tx) {
            Ok(value) => match tx.commit() {
                Ok(()) => {
                    self.emit(TxEvent::Commit { tx_id: id });
                    self.active.remove(&id);
                    Ok(value)
                }
                Err(e) => {
                    self.emit(TxEvent::Error {
                        tx_id: id,
                        message: e.to_string(),
                    });
                    self.active.remove(&id);
                    Err(e)
                }
            },
            Err(e) => {
                tx.rollback();
                self.emit(TxEvent::Rollback { tx_id: id });
                self.active.remove(&id);
                Err(e)
            }
        }
    }

    pub fn execute_read_only<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut GraphTx) -> Result<R>,
    {
        let mut config = self.default_config.read().unwrap().clone();
        config.read_only = true;
        self.execute_with_config(config, f)
    }

    pub fn get_active_transactions(&self) -> Vec<Uuid> {
        self.active.iter().map(|entry| *entry.key()).collect()
    }

    pub fn get_transaction_stats(&self, id: Uuid) -> Option<TxStats> {
        self.active.get(&id).map(|c| c.snapshot_stats())
    }

    /// Force-aborts an active transaction; the owning `GraphTx` observes
    /// this on its next operation and returns `AbortedByManager`.
    pub fn abort_transaction(&self, id: Uuid) {
        if let Some(control) = self.active.get(&id) {
            control.request_abort();
            self.emit(TxEvent::Error {
                tx_id: id,
                message: "aborted by manager".to_string(),
            });
        }
        self.active.remove(&id);
    }

    /// Aborts every still-active transaction. Callers that hold a `GraphTx`
    /// past this point will see `AbortedByManager` on their next call.
    pub fn close(&self) {
        let ids: Vec<Uuid> = self.get_active_transactions();
        for id in ids {
            self.abort_transaction(id);
        }
    }
}
