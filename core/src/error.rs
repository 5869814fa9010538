use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("empty response: {0}")]
    EmptyResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("workflow transition error: {0}")]
    WorkflowTransition(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
