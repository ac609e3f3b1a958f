use async_trait::async_trait;
use tracing::debug;

use crate::types::{ChatRequest, ChatResponse};
use crate::{ChatAgentError, Result};

// ─── Trait ────────────────────────────────────────────────────────────────

/// A single request/response chat completion.
///
/// Implementations return the trimmed text of the first choice, or an error
/// when the call fails or the model produced no text.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<String>;
}

// ─── ChatClient ───────────────────────────────────────────────────────────

/// HTTP client for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Build a client whose key is read from the environment variable `var`.
    pub fn from_env(base_url: impl Into<String>, var: &str) -> Result<Self> {
        let key = std::env::var(var).map_err(|_| ChatAgentError::MissingApiKey(var.to_string()))?;
        Ok(Self::new(base_url, Some(key)))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatCompletion for ChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        debug!(model = %request.model, messages = request.messages.len(), "chat completion request");

        let mut builder = self.http.post(self.endpoint()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatAgentError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let parsed: ChatResponse = serde_json::from_slice(&bytes)?;
        parsed
            .first_text()
            .map(str::to_string)
            .ok_or(ChatAgentError::EmptyResponse)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
