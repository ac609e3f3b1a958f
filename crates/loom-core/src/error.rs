use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LoomError {
    #[error("not initialized: run 'loom init'")]
    NotInitialized,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{stage} call failed: {reason}")]
    Transform { stage: &'static str, reason: String },

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("record not found: {0}")]
    RecordNotFound(Uuid),

    #[error("no seed prompts available: add one with 'loom seed add'")]
    NoSeedPrompts,

    #[error("store error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoomError>;
