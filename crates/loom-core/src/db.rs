//! Persistent storage for generation records and the seed library using redb.
//!
//! # Table design
//!
//! `RECORDS` uses a 24-byte composite key:
//! ```text
//! [ created_at_ms: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//!
//! Because the timestamp occupies the high bytes in big-endian encoding,
//! byte ordering equals creation ordering. The stamp never goes backwards:
//! records created within the same millisecond get consecutive stamps. Listing newest-first is a reverse
//! iteration with skip/limit, no sorting in application code.
//!
//! `RECORD_KEYS` maps a record's uuid to its composite key so updates by id
//! don't need a scan. `SEEDS` is keyed by uuid bytes.

use std::path::Path;

use chrono::{DateTime, Utc};
use rand::Rng;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use uuid::Uuid;

use crate::error::{LoomError, Result};
use crate::record::{GenerationRecord, NewRecord, Page, SeedPrompt};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

/// Key: 24-byte composite (created_at_ms big-endian ++ uuid bytes)
/// Value: JSON-encoded GenerationRecord
const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

/// Key: uuid bytes. Value: composite key into `RECORDS`.
const RECORD_KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("record_keys");

/// Key: uuid bytes. Value: JSON-encoded SeedPrompt
const SEEDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("seeds");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn record_key(stamp: u64, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&stamp.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn key_stamp(key: &[u8]) -> Option<u64> {
    key.get(..8)?.try_into().ok().map(u64::from_be_bytes)
}

fn millis(ts: DateTime<Utc>) -> u64 {
    ts.timestamp_millis().max(0) as u64
}

fn db_err(e: impl std::fmt::Display) -> LoomError {
    LoomError::Persistence(e.to_string())
}

// ---------------------------------------------------------------------------
// RecordDb
// ---------------------------------------------------------------------------

/// Persistent store for `GenerationRecord`s and `SeedPrompt`s.
pub struct RecordDb {
    db: Database,
    /// Number of upcoming `create_record` calls that fail.
    #[cfg(test)]
    pub(crate) failing_creates: std::sync::atomic::AtomicUsize,
}

impl RecordDb {
    /// Open or create the redb database at `path`.
    ///
    /// Creates all tables if they don't already exist.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        // Ensure the tables exist before any reads
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(RECORDS).map_err(db_err)?;
        wt.open_table(RECORD_KEYS).map_err(db_err)?;
        wt.open_table(SEEDS).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self {
            db,
            #[cfg(test)]
            failing_creates: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Persist a new record. Assigns the id and both timestamps.
    pub fn create_record(&self, new: NewRecord) -> Result<GenerationRecord> {
        #[cfg(test)]
        {
            use std::sync::atomic::Ordering;
            let failing = &self.failing_creates;
            if failing
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(LoomError::Persistence("write rejected".into()));
            }
        }
        let record = GenerationRecord::from_new(new, Utc::now());
        let value = serde_json::to_vec(&record)?;

        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut records = wt.open_table(RECORDS).map_err(db_err)?;
            let last = records
                .last()
                .map_err(db_err)?
                .and_then(|(k, _)| key_stamp(k.value()));
            let stamp = match last {
                Some(prev) if prev >= millis(record.created_at) => prev + 1,
                _ => millis(record.created_at),
            };
            let key = record_key(stamp, record.id);
            records
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
            let mut keys = wt.open_table(RECORD_KEYS).map_err(db_err)?;
            keys.insert(record.id.as_bytes().as_slice(), key.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(record)
    }

    /// Fetch a record by id.
    pub fn get_record(&self, id: Uuid) -> Result<Option<GenerationRecord>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let keys = rt.open_table(RECORD_KEYS).map_err(db_err)?;
        let key = match keys.get(id.as_bytes().as_slice()).map_err(db_err)? {
            Some(guard) => guard.value().to_vec(),
            None => return Ok(None),
        };
        let records = rt.open_table(RECORDS).map_err(db_err)?;
        let record = match records.get(key.as_slice()).map_err(db_err)? {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(record)
    }

    /// Replace the asset references of the record identified by `id` and bump
    /// `updated_at`. Returns the updated record, or `RecordNotFound`.
    pub fn set_asset_refs(&self, id: Uuid, asset_refs: Vec<String>) -> Result<GenerationRecord> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let record = {
            let keys = wt.open_table(RECORD_KEYS).map_err(db_err)?;
            let key = match keys.get(id.as_bytes().as_slice()).map_err(db_err)? {
                Some(guard) => guard.value().to_vec(),
                None => return Err(LoomError::RecordNotFound(id)),
            };

            let mut records = wt.open_table(RECORDS).map_err(db_err)?;
            let mut record: GenerationRecord = match records.get(key.as_slice()).map_err(db_err)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(LoomError::RecordNotFound(id)),
            };
            record.asset_refs = asset_refs;
            record.updated_at = Utc::now();

            let value = serde_json::to_vec(&record)?;
            records
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
            record
        };
        wt.commit().map_err(db_err)?;
        Ok(record)
    }

    pub fn count_records(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(RECORDS).map_err(db_err)?;
        table.len().map_err(db_err)
    }

    /// Return page `page` (1-based) of `page_size` records, newest first.
    ///
    /// A `page` of 0 is treated as 1.
    pub fn list_page(&self, page: u64, page_size: u64) -> Result<Page> {
        let page = page.max(1);
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(RECORDS).map_err(db_err)?;
        let total = table.len().map_err(db_err)?;

        let skip = (page - 1).saturating_mul(page_size);
        let mut items = Vec::new();
        for entry in table
            .iter()
            .map_err(db_err)?
            .rev()
            .skip(skip as usize)
            .take(page_size as usize)
        {
            let (_, v) = entry.map_err(db_err)?;
            items.push(serde_json::from_slice(v.value())?);
        }

        Ok(Page {
            items,
            total,
            page_count: Page::page_count(total, page_size),
            current_page: page,
        })
    }

    /// Every stored sequence label that starts with `prefix`, in creation order.
    ///
    /// With `since`, the scan walks back from the newest record and stops at
    /// the first one stamped before `since`.
    pub fn labels_with_prefix(
        &self,
        prefix: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(RECORDS).map_err(db_err)?;
        let cutoff = since.map(millis).unwrap_or(0);

        let mut labels = Vec::new();
        for entry in table.iter().map_err(db_err)?.rev() {
            let (k, v) = entry.map_err(db_err)?;
            if key_stamp(k.value()).is_some_and(|stamp| stamp < cutoff) {
                break;
            }
            let record: GenerationRecord = serde_json::from_slice(v.value())?;
            if record.sequence_label.starts_with(prefix) {
                labels.push(record.sequence_label);
            }
        }
        labels.reverse();
        Ok(labels)
    }

    // -----------------------------------------------------------------------
    // Seeds
    // -----------------------------------------------------------------------

    pub fn add_seed(&self, prompt: &str) -> Result<SeedPrompt> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(LoomError::InvalidRequest("seed prompt must not be empty".into()));
        }
        let seed = SeedPrompt::new(prompt);
        let value = serde_json::to_vec(&seed)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(SEEDS).map_err(db_err)?;
            table
                .insert(seed.id.as_bytes().as_slice(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(seed)
    }

    /// List all seeds, oldest first.
    pub fn list_seeds(&self) -> Result<Vec<SeedPrompt>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(SEEDS).map_err(db_err)?;

        let mut seeds = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            let seed: SeedPrompt = serde_json::from_slice(v.value())?;
            seeds.push(seed);
        }
        seeds.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(seeds)
    }

    pub fn count_seeds(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(SEEDS).map_err(db_err)?;
        table.len().map_err(db_err)
    }

    /// Pick a uniformly random seed. `NoSeedPrompts` when the library is empty.
    pub fn random_seed(&self) -> Result<SeedPrompt> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(SEEDS).map_err(db_err)?;
        let count = table.len().map_err(db_err)?;
        if count == 0 {
            return Err(LoomError::NoSeedPrompts);
        }

        let index = rand::thread_rng().gen_range(0..count) as usize;
        let entry = table
            .iter()
            .map_err(db_err)?
            .nth(index)
            .ok_or(LoomError::NoSeedPrompts)?;
        let (_, v) = entry.map_err(db_err)?;
        Ok(serde_json::from_slice(v.value())?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
