//! Per-day sequence labels: `YYMMDD_<variant>_<unit>`.
//!
//! The label format is read back by [`last_variant_index`], so it must stay
//! bit-exact: a zero-padded six-digit date and unpadded integers.

use std::sync::{Mutex, OnceLock, PoisonError};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use regex::Regex;

use crate::db::RecordDb;
use crate::error::Result;

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{6})_(\d+)_(\d+)$").unwrap())
}

/// `YYMMDD` for `date`.
pub fn date_prefix(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// `YYMMDD` for the local calendar day.
pub fn today_prefix() -> String {
    date_prefix(Local::now().date_naive())
}

/// Start of the local day named by a `YYMMDD` prefix, as UTC.
fn day_start(prefix: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(prefix, "%y%m%d").ok()?;
    let midnight = Local
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()?;
    Some(midnight.with_timezone(&Utc))
}

pub fn format_label(prefix: &str, variant: u32, unit: u32) -> String {
    format!("{prefix}_{variant}_{unit}")
}

/// Highest variant index among `labels` that belong to day `prefix`, or `-1`
/// when none match.
///
/// Scans every matching label rather than trusting the most recently created
/// one, so out-of-order writes (a resubmit racing a batch) can't make it
/// under-count.
pub fn last_variant_index<I, S>(prefix: &str, labels: I) -> i64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .filter_map(|label| {
            let caps = label_re().captures(label.as_ref())?;
            if &caps[1] != prefix {
                return None;
            }
            caps[2].parse::<i64>().ok()
        })
        .max()
        .unwrap_or(-1)
}

/// First free variant index after `last`. Variant numbering starts at 1.
pub fn next_variant(last: i64) -> u32 {
    (last + 1).clamp(1, i64::from(u32::MAX)) as u32
}

/// Reads persisted labels for one day and derives variant indices from them.
pub struct SequenceAllocator<'a> {
    db: &'a RecordDb,
}

impl<'a> SequenceAllocator<'a> {
    pub fn new(db: &'a RecordDb) -> Self {
        Self { db }
    }

    /// Highest variant index already used under `prefix`, or `-1`.
    pub fn last_variant(&self, prefix: &str) -> Result<i64> {
        let labels = self
            .db
            .labels_with_prefix(&format!("{prefix}_"), day_start(prefix))?;
        Ok(last_variant_index(prefix, &labels))
    }

    /// First variant index not yet used under `prefix`.
    pub fn next_variant(&self, prefix: &str) -> Result<u32> {
        Ok(next_variant(self.last_variant(prefix)?))
    }
}

/// In-process reservations of variant indices.
///
/// A batch fixes its variant numbers when it starts but writes its records
/// one by one over minutes. Without a reservation, a resubmit landing in the
/// middle would read the store, see only the variants written so far, and
/// pick a number the batch is about to use.
#[derive(Debug, Default)]
pub struct VariantReservations {
    // (day prefix, first variant not yet handed out)
    next: Mutex<Option<(String, u32)>>,
}

impl VariantReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `count` consecutive variant indices under `prefix` and return
    /// the first one.
    pub fn reserve(&self, db: &RecordDb, prefix: &str, count: u32) -> Result<u32> {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let from_store = SequenceAllocator::new(db).next_variant(prefix)?;
        let first = match next.as_ref() {
            Some((day, reserved)) if day == prefix => from_store.max(*reserved),
            _ => from_store,
        };
        *next = Some((prefix.to_string(), first.saturating_add(count)));
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NewRecord;
    use tempfile::TempDir;

    #[test]
    fn date_prefix_is_zero_padded() {
        let d = NaiveDate::from_ymd_opt(2025, 4, 9).unwrap();
        assert_eq!(date_prefix(d), "250409");
        let d = NaiveDate::from_ymd_opt(2031, 1, 2).unwrap();
        assert_eq!(date_prefix(d), "310102");
    }

    #[test]
    fn format_label_is_unpadded() {
        assert_eq!(format_label("250409", 3, 12), "250409_3_12");
    }

    #[test]
    fn no_labels_is_minus_one() {
        assert_eq!(last_variant_index("250409", Vec::<String>::new()), -1);
    }

    #[test]
    fn single_label_returns_its_variant() {
        assert_eq!(last_variant_index("250409", ["250409_3_1"]), 3);
    }

    #[test]
    fn other_days_are_ignored() {
        assert_eq!(last_variant_index("250409", ["250408_9_1", "250408_2_4"]), -1);
    }

    #[test]
    fn true_maximum_not_last_written() {
        let labels = ["250409_5_1", "250409_12_3", "250409_2_1"];
        assert_eq!(last_variant_index("250409", labels), 12);
    }

    #[test]
    fn malformed_labels_do_not_match() {
        let labels = ["250409_x_1", "250409_4", "250409_4_1_extra", "2504090_4_1", "xx250409_8_1"];
        assert_eq!(last_variant_index("250409", labels), -1);
    }

    #[test]
    fn day_start_is_local_midnight() {
        let start = day_start("250409").unwrap().with_timezone(&Local);
        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2025, 4, 9).unwrap());
        assert_eq!(start.time(), chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert!(day_start("not-a-day").is_none());
    }

    #[test]
    fn next_variant_starts_at_one() {
        assert_eq!(next_variant(-1), 1);
        assert_eq!(next_variant(0), 1);
        assert_eq!(next_variant(3), 4);
    }

    #[test]
    fn allocator_reads_store() {
        let dir = TempDir::new().unwrap();
        let db = RecordDb::open(&dir.path().join("loom.db")).unwrap();
        let alloc = SequenceAllocator::new(&db);
        assert_eq!(alloc.last_variant("250409").unwrap(), -1);
        assert_eq!(alloc.next_variant("250409").unwrap(), 1);

        for label in ["250408_9_1", "250409_3_1", "250409_3_2"] {
            db.create_record(NewRecord {
                seed_prompt: "s".into(),
                structured_prompt: "p".into(),
                submission_prompt: "m".into(),
                sequence_label: label.into(),
            })
            .unwrap();
        }
        assert_eq!(alloc.last_variant("250409").unwrap(), 3);
        assert_eq!(alloc.next_variant("250409").unwrap(), 4);
        assert_eq!(alloc.last_variant("250410").unwrap(), -1);
    }

    #[test]
    fn reservations_do_not_overlap_unwritten_variants() {
        let dir = TempDir::new().unwrap();
        let db = RecordDb::open(&dir.path().join("loom.db")).unwrap();
        let reservations = VariantReservations::new();

        // A batch of three variants, nothing written yet.
        assert_eq!(reservations.reserve(&db, "250409", 3).unwrap(), 1);
        // A resubmit in the meantime gets the first index after the batch.
        assert_eq!(reservations.reserve(&db, "250409", 1).unwrap(), 4);
        // A new day starts from the store again.
        assert_eq!(reservations.reserve(&db, "250410", 1).unwrap(), 1);
    }

    #[test]
    fn reservations_follow_the_store_when_it_is_ahead() {
        let dir = TempDir::new().unwrap();
        let db = RecordDb::open(&dir.path().join("loom.db")).unwrap();
        let reservations = VariantReservations::new();
        assert_eq!(reservations.reserve(&db, "250409", 1).unwrap(), 1);

        db.create_record(NewRecord {
            seed_prompt: "s".into(),
            structured_prompt: "p".into(),
            submission_prompt: "m".into(),
            sequence_label: "250409_7_1".into(),
        })
        .unwrap();
        assert_eq!(reservations.reserve(&db, "250409", 2).unwrap(), 8);
    }
}
