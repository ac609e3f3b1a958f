use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatAgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion endpoint returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Failed to parse completion response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("completion response contained no text")]
    EmptyResponse,

    #[error("API key not set: export {0}")]
    MissingApiKey(String),
}
