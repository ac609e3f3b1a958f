//! Persisted data model: generation records, seed prompts, and result pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// GenerationRecord
// ---------------------------------------------------------------------------

/// One submitted unit of work.
///
/// Created with empty `asset_refs` right before submission; the submission
/// stage fills in the four grid URLs once the image service resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: Uuid,
    pub seed_prompt: String,
    pub structured_prompt: String,
    pub submission_prompt: String,
    #[serde(default)]
    pub asset_refs: Vec<String>,
    pub sequence_label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the caller when creating a record. The store assigns
/// `id` and the timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub seed_prompt: String,
    pub structured_prompt: String,
    pub submission_prompt: String,
    pub sequence_label: String,
}

impl GenerationRecord {
    pub fn from_new(new: NewRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            seed_prompt: new.seed_prompt,
            structured_prompt: new.structured_prompt,
            submission_prompt: new.submission_prompt,
            asset_refs: Vec::new(),
            sequence_label: new.sequence_label,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_assets(&self) -> bool {
        !self.asset_refs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SeedPrompt
// ---------------------------------------------------------------------------

/// An entry in the seed library that batches draw from when no seed prompt
/// is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPrompt {
    pub id: Uuid,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

impl SeedPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// One page of records, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<GenerationRecord>,
    pub total: u64,
    pub page_count: u64,
    pub current_page: u64,
}

impl Page {
    pub fn page_count(total: u64, page_size: u64) -> u64 {
        if page_size == 0 {
            return 0;
        }
        total.div_ceil(page_size)
    }
}
