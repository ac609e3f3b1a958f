//! Client side of the image-generation bot.
//!
//! The bot itself lives behind an HTTP bridge:
//!
//! ```text
//! GET  {base}/health              → 2xx when the bot session is up
//! POST {base}/imagine {"prompt"}  → {"id"}
//! GET  {base}/jobs/{id}           → {"status", "progress"?, "uri"?}
//! ```
//!
//! `submit` polls the job until it reaches a terminal status, feeding every
//! progress string to the caller's callback.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ImagineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image bridge returned {code}: {body}")]
    Status { code: u16, body: String },
}

/// Terminal result of one imagine job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagineResult {
    pub id: String,
    /// Reference to the generated grid image.
    pub uri: String,
}

/// Callback fed with interim job status strings.
pub type ProgressFn = dyn for<'s> Fn(&'s str) + Send + Sync;

#[async_trait]
pub trait ImagineClient: Send + Sync {
    async fn connect(&self) -> Result<(), ImagineError>;

    /// Submit `prompt` and wait for the job to finish. `Ok(None)` when the
    /// service finished without producing an image. `progress` receives
    /// interim status strings and is only used for logging.
    async fn submit(
        &self,
        prompt: &str,
        progress: &ProgressFn,
    ) -> Result<Option<ImagineResult>, ImagineError>;

    async fn close(&self);
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ImagineRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobCreated {
    id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
struct JobState {
    status: JobStatus,
    #[serde(default)]
    progress: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

// ---------------------------------------------------------------------------
// HttpImagineClient
// ---------------------------------------------------------------------------

pub struct HttpImagineClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    poll_interval: Duration,
}

impl HttpImagineClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, poll_interval: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            poll_interval,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.get(format!("{}{path}", self.base_url)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.post(format!("{}{path}", self.base_url)))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ImagineError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(ImagineError::Status {
            code: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ImagineClient for HttpImagineClient {
    async fn connect(&self) -> Result<(), ImagineError> {
        let resp = self.get("/health").send().await?;
        check(resp).await.map(|_| ())
    }

    async fn submit(
        &self,
        prompt: &str,
        progress: &ProgressFn,
    ) -> Result<Option<ImagineResult>, ImagineError> {
        let resp = self
            .post("/imagine")
            .json(&ImagineRequest { prompt })
            .send()
            .await?;
        let job: JobCreated = check(resp).await?.json().await?;
        debug!(job_id = %job.id, "imagine job created");

        loop {
            let resp = self.get(&format!("/jobs/{}", job.id)).send().await?;
            let state: JobState = check(resp).await?.json().await?;
            if let Some(p) = state.progress.as_deref() {
                progress(p);
            }
            match state.status {
                JobStatus::Pending | JobStatus::Running => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                JobStatus::Completed => {
                    return Ok(state.uri.map(|uri| ImagineResult { id: job.id, uri }));
                }
                JobStatus::Failed => return Ok(None),
            }
        }
    }

    async fn close(&self) {}
}
