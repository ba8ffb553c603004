use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unknown step: {0}")]
    UnknownStep(String),

    #[error("step {step} is not valid on the current result type")]
    InvalidStepInput { step: String },

    #[error("graph error: {0}")]
    Graph(#[from] raro_graph::GraphError),
}
