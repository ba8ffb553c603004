use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent init failed: {0}")]
    InitFailure(String),

    #[error("process_message panicked: {0}")]
    HandlerPanic(String),

    #[error("handler error: {0}")]
    Handler(String),

    #[error(transparent)]
    Broker(#[from] raro_broker::BrokerError),

    #[error(transparent)]
    Vfs(#[from] raro_vfs::VfsError),
}
