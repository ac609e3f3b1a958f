//! Hands a finalized prompt to the image bot and stores the resulting asset
//! URLs on the record.
//!
//! Nothing raises past this boundary: every failure is logged and reported as
//! a [`SubmissionOutcome`]. A record is updated at most once, and only on
//! success.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::RecordDb;
use crate::error::LoomError;
use crate::imagine::{ImagineClient, ImagineResult};
use crate::record::GenerationRecord;

/// Number of images in one generated grid.
pub const GRID_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// Asset URLs were written to the record.
    Stored(GenerationRecord),
    /// The bot finished without an image.
    NoResult,
    /// The result reference carried no recognizable content id.
    NoAssetId { uri: String },
    /// The record to update no longer exists.
    RecordNotFound(Uuid),
    /// Connection, transport, timeout or store failure.
    Failed(String),
}

impl SubmissionOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }
}

fn asset_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-f0-9-]{36})\.png").unwrap())
}

/// The 36-character content id right before `.png`, if any.
pub fn extract_asset_id(uri: &str) -> Option<&str> {
    asset_id_re()
        .captures(uri)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// `<cdn>/<id>/0_0.png` … `<cdn>/<id>/0_3.png`.
pub fn asset_urls(cdn_base: &str, asset_id: &str) -> Vec<String> {
    let base = cdn_base.trim_end_matches('/');
    (0..GRID_SIZE)
        .map(|i| format!("{base}/{asset_id}/0_{i}.png"))
        .collect()
}

pub struct SubmissionStage {
    client: Arc<dyn ImagineClient>,
    db: Arc<RecordDb>,
    cdn_base: String,
    timeout: Option<Duration>,
}

impl SubmissionStage {
    pub fn new(
        client: Arc<dyn ImagineClient>,
        db: Arc<RecordDb>,
        cdn_base: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            db,
            cdn_base: cdn_base.into(),
            timeout,
        }
    }

    /// Submit `prompt` for the record `record_id` and store the asset URLs.
    pub async fn submit(&self, prompt: &str, record_id: Uuid) -> SubmissionOutcome {
        let result = match self.dispatch(prompt, record_id).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                warn!(%record_id, "image service returned no result");
                return SubmissionOutcome::NoResult;
            }
            Err(reason) => {
                error!(%record_id, %reason, "submission failed");
                return SubmissionOutcome::Failed(reason);
            }
        };
        info!(%record_id, uri = %result.uri, "image generated");

        let Some(asset_id) = extract_asset_id(&result.uri) else {
            warn!(%record_id, uri = %result.uri, "no asset id in result reference");
            return SubmissionOutcome::NoAssetId { uri: result.uri };
        };

        let db = self.db.clone();
        let urls = asset_urls(&self.cdn_base, asset_id);
        let stored = tokio::task::spawn_blocking(move || db.set_asset_refs(record_id, urls))
            .await
            .unwrap_or_else(|e| Err(LoomError::Persistence(format!("store task failed: {e}"))));
        match stored {
            Ok(record) => SubmissionOutcome::Stored(record),
            Err(LoomError::RecordNotFound(id)) => {
                error!(record_id = %id, "record not found for asset update");
                SubmissionOutcome::RecordNotFound(id)
            }
            Err(e) => {
                error!(%record_id, error = %e, "failed to store asset refs");
                SubmissionOutcome::Failed(e.to_string())
            }
        }
    }

    async fn dispatch(
        &self,
        prompt: &str,
        record_id: Uuid,
    ) -> Result<Option<ImagineResult>, String> {
        self.client.connect().await.map_err(|e| e.to_string())?;

        let progress = move |p: &str| debug!(%record_id, progress = p, "imagine progress");
        let submitted = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.client.submit(prompt, &progress))
                .await
                .map_err(|_| format!("timed out after {}s", limit.as_secs())),
            None => Ok(self.client.submit(prompt, &progress).await),
        };
        self.client.close().await;

        submitted?.map_err(|e| e.to_string())
    }
}
