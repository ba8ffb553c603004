use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("broker is closed")]
    BrokerClosed,
}
