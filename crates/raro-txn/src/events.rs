use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum TxEvent {
    Begin { tx_id: Uuid },
    Operation { tx_id: Uuid, description: String },
    Commit { tx_id: Uuid },
    Rollback { tx_id: Uuid },
    Error { tx_id: Uuid, message: String },
    Savepoint { tx_id: Uuid, name: String },
}

/// Observer interface for the transaction manager; implementations are
/// expected to be cheap (metrics counters, audit-log appenders) since they
/// run synchronously on the calling thread.
pub trait TxListener: Send + Sync {
    fn on_event(&self, event: &TxEvent);
}
