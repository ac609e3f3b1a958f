//! Two chained LLM calls that turn a seed prompt into a submission prompt.
//!
//! 1. **Breakdown** expands the seed into a structured scene description.
//! 2. **Condensation** folds that description into one short image prompt.
//!
//! The fixed parameter suffix is appended afterwards, never by the model.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chat_agent::{ChatCompletion, ChatMessage, ChatRequest};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{LoomError, Result};

const BREAKDOWN_SYSTEM: &str = "You are an art director preparing a brief for an image generator. \
Rewrite the user's idea in clear English as a structured scene breakdown with exactly these fields, \
one per line: Meaning, Main Metaphor, Sub Metaphor, Lighting, Camera Angle, Background, \
Main Color (hex), Tone & Mood, Render, Story, Point (style tags).";

const CONDENSE_SYSTEM: &str = "Convert the scene breakdown into a single image-generation prompt. \
Write one natural-language description. Do not add a title, section headers, or field names. \
Do not include any generation parameters such as --ar, --v or --s.";

/// Output of the transform stage for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedPrompt {
    pub structured: String,
    pub submission: String,
}

pub struct PromptTransformStage {
    llm: Arc<dyn ChatCompletion>,
    model: String,
    max_tokens: u32,
    suffix: String,
    timeout: Option<Duration>,
}

impl PromptTransformStage {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        model: impl Into<String>,
        max_tokens: u32,
        suffix: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens,
            suffix: suffix.into(),
            timeout,
        }
    }

    /// Seed → structured scene breakdown.
    pub async fn breakdown(&self, seed: &str) -> Result<String> {
        self.call(
            "breakdown",
            BREAKDOWN_SYSTEM,
            format!("Break down this prompt: {seed}"),
        )
        .await
    }

    /// Structured breakdown → one-line prompt without parameters.
    pub async fn condense(&self, structured: &str) -> Result<String> {
        let text = self
            .call(
                "condensation",
                CONDENSE_SYSTEM,
                format!("Convert this into an image prompt: {structured}"),
            )
            .await?;
        Ok(strip_parameters(&text))
    }

    /// Run both calls and append the parameter suffix.
    pub async fn transform(&self, seed: &str) -> Result<TransformedPrompt> {
        let structured = self.breakdown(seed).await?;
        let condensed = self.condense(&structured).await?;
        let submission = append_suffix(&condensed, &self.suffix);
        debug!(submission = %submission, "transform complete");
        Ok(TransformedPrompt {
            structured,
            submission,
        })
    }

    async fn call(&self, stage: &'static str, system: &str, user: String) -> Result<String> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage::system(system), ChatMessage::user(user)],
            self.max_tokens,
        );

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.llm.complete(request)).await {
                Ok(res) => res,
                Err(_) => {
                    warn!(stage, ?limit, "transform call timed out");
                    return Err(LoomError::Transform {
                        stage,
                        reason: format!("timed out after {}s", limit.as_secs()),
                    });
                }
            },
            None => self.llm.complete(request).await,
        };

        let text = outcome.map_err(|e| LoomError::Transform {
            stage,
            reason: e.to_string(),
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(LoomError::Transform {
                stage,
                reason: "empty response".into(),
            });
        }
        Ok(text.to_string())
    }
}

fn param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(^|\s)--[A-Za-z]+(\s+[^\s-]\S*)?").unwrap())
}

/// Drop `--flag value` parameters the model may have echoed and collapse the
/// text onto one line.
pub fn strip_parameters(text: &str) -> String {
    let stripped = param_re().replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Append `suffix` to `prompt` exactly once.
pub fn append_suffix(prompt: &str, suffix: &str) -> String {
    let body = strip_parameters(prompt);
    let suffix = suffix.trim();
    match (body.is_empty(), suffix.is_empty()) {
        (_, true) => body,
        (true, false) => suffix.to_string(),
        (false, false) => format!("{body} {suffix}"),
    }
}
