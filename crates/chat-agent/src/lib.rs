//! `chat-agent` — native Rust driver for OpenAI-compatible chat completions.
//!
//! The loom pipeline calls a text model twice per variant: once to break a
//! seed prompt down into a structured scene description, and once to condense
//! that description into an image prompt. This crate owns the wire format and
//! the HTTP client for those calls so the engine only sees [`ChatCompletion`].
//!
//! # Architecture
//!
//! ```text
//! ChatRequest
//!     │
//!     ▼
//! ChatClient      ← POST {base_url}/chat/completions (reqwest, bearer auth)
//!     │
//!     ▼
//! ChatResponse    ← first choice's message content, trimmed
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use chat_agent::{ChatClient, ChatCompletion, ChatMessage, ChatRequest};
//!
//! let client = ChatClient::new("https://api.openai.com/v1", Some(api_key));
//! let req = ChatRequest::new(
//!     "gpt-4",
//!     vec![ChatMessage::system("Be brief."), ChatMessage::user("hello")],
//!     200,
//! );
//! let text = client.complete(req).await?;
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{ChatClient, ChatCompletion};
pub use error::ChatAgentError;
pub use types::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, Role};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ChatAgentError>;
