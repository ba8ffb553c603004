use std::time::Duration;

/// Advisory beyond `ReadCommitted`: the built-in manager relies on the KV
/// store's own concurrency (snapshot reads, serialized writers) rather than
/// an additional lock manager. `RepeatableRead`/`Serializable` are accepted
/// and recorded on [`crate::GraphTx`] but do not change observable behavior
/// in this implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone)]
pub struct TransactionConfig {
    pub isolation: IsolationLevel,
    pub timeout: Duration,
    pub read_only: bool,
    pub max_retries: u32,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::default(),
            timeout: Duration::from_secs(30),
            read_only: false,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TxContext {
    pub principal: Option<String>,
    pub correlation_id: Option<String>,
}
