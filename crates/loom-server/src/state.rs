use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chat_agent::{ChatClient, ChatCompletion};
use loom_core::config::Config;
use loom_core::db::RecordDb;
use loom_core::imagine::{HttpImagineClient, ImagineClient};
use loom_core::notify::Notifier;
use loom_core::orchestrator::BatchOrchestrator;
use loom_core::submission::SubmissionStage;
use loom_core::transform::PromptTransformStage;
use tracing::warn;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub db: Arc<RecordDb>,
    pub orchestrator: BatchOrchestrator,
    pub notifier: Notifier,
}

impl AppState {
    /// Open the store under `root` and wire the real LLM and image clients
    /// described by `config`.
    pub fn new(root: PathBuf, config: &Config) -> anyhow::Result<Self> {
        let db = Arc::new(RecordDb::open(&loom_core::paths::db_path(&root))?);

        let llm = ChatClient::from_env(config.llm.base_url.clone(), &config.llm.api_key_env)?;
        let token = std::env::var(&config.imagine.token_env).ok();
        if token.is_none() {
            warn!(
                var = %config.imagine.token_env,
                "image bridge token not set, sending unauthenticated requests"
            );
        }
        let imagine = HttpImagineClient::new(
            config.imagine.base_url.clone(),
            token,
            Duration::from_secs(config.imagine.poll_interval_secs),
        );

        Ok(Self::with_services(
            root,
            db,
            Arc::new(llm),
            Arc::new(imagine),
            config,
        ))
    }

    /// Build the state around already constructed services.
    pub fn with_services(
        root: PathBuf,
        db: Arc<RecordDb>,
        llm: Arc<dyn ChatCompletion>,
        imagine: Arc<dyn ImagineClient>,
        config: &Config,
    ) -> Self {
        let timeout = config.batch.call_timeout();
        let transform = PromptTransformStage::new(
            llm,
            config.llm.model.clone(),
            config.llm.max_tokens,
            config.batch.parameter_suffix.clone(),
            timeout,
        );
        let submission = SubmissionStage::new(
            imagine,
            db.clone(),
            config.imagine.cdn_base.clone(),
            timeout,
        );
        let notifier = Notifier::new();
        let orchestrator = BatchOrchestrator::new(
            db.clone(),
            transform,
            submission,
            notifier.clone(),
            config.batch.pacing(),
        );
        Self {
            root,
            db,
            orchestrator,
            notifier,
        }
    }
}
