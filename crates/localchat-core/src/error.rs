//! Error types for the engine capability boundary.

/// Errors raised while creating an engine or requesting a completion.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("request to model server failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model server error: {0}")]
    Server(String),
    #[error("could not decode model server response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("model not available: {0}")]
    ModelNotFound(String),
    #[error("completion returned no choices")]
    EmptyResponse,
    #[error("engine creation already started")]
    AlreadyStarted,
}
