//! Staging loader (Component E).
//!
//! `load` sanitizes, hashes, within-batch-dedupes, and bulk-loads raw
//! entries into the staging table in one logical batch per call.
//! `mark_source_completed` / `try_finalize` drive the finalize path that
//! moves staged rows into canonical tables under a cross-process advisory
//! lock.

use crate::error::{DbError, DbResult};
use crate::models::{RawEntry, StagingRow};
use crate::pool::DbPool;
use crate::retry::{retry_finalize, FinalizeRetryPolicy};
use asupersync::{Cx, Outcome};
use dictionary_core::sentinels::{bounds, normalize_source_code, truncate_chars};
use dictionary_core::timestamps::{coerce_created_utc, now_micros};
use dictionary_text::hash::sha256_hex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Minimum/maximum adaptive batch size, per spec §4.E.
pub const MIN_BATCH_SIZE: usize = 500;
pub const MAX_BATCH_SIZE: usize = 4000;
const GROW_STEP: usize = 250;
const SHRINK_STEP: usize = 250;
const GROW_THRESHOLD: std::time::Duration = std::time::Duration::from_millis(300);
const SHRINK_THRESHOLD: std::time::Duration = std::time::Duration::from_millis(1200);

/// Outcome of one [`StagingLoader::load`] call.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub sanitized: usize,
    pub dropped_invalid: usize,
    pub deduplicated_within_batch: usize,
    pub inserted: usize,
}

/// Sanitize one raw entry into a [`StagingRow`], or `None` if it must be
/// dropped (blank word/definition, or a malformed hash).
#[must_use]
pub fn sanitize(entry: &RawEntry) -> Option<StagingRow> {
    let word = entry.word.trim();
    let definition = entry.definition.trim();
    if word.is_empty() || definition.is_empty() {
        return None;
    }

    let word = truncate_chars(word, bounds::WORD);
    let normalized_word = truncate_chars(entry.normalized_word.trim(), bounds::WORD);
    let part_of_speech = entry
        .part_of_speech
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, bounds::PART_OF_SPEECH));
    let definition = truncate_chars(definition, bounds::DEFINITION);
    let etymology = entry
        .etymology
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, bounds::ETYMOLOGY));
    let raw_fragment = entry
        .raw_fragment
        .as_deref()
        .map(|s| truncate_chars(s, bounds::RAW_FRAGMENT));
    let source_code = normalize_source_code(&entry.source_code);
    let created_utc = coerce_created_utc(entry.created_utc);

    let word_hash = sha256_hex(&word);
    let definition_hash = sha256_hex(&definition);
    if word_hash.len() != 64 || definition_hash.len() != 64 {
        return None;
    }

    Some(StagingRow {
        word,
        normalized_word,
        part_of_speech,
        definition,
        etymology,
        sense_number: entry.sense_number,
        raw_fragment,
        source_code,
        created_utc,
        word_hash,
        definition_hash,
    })
}

/// Within-batch dedup key: `(sourceCode lower, senseNumber, normalizedWord
/// lower, whitespace-collapsed definition lower, truncated to 512 chars)`.
#[must_use]
pub fn within_batch_key(row: &StagingRow) -> (String, i64, String, String) {
    let collapsed: String = row
        .definition
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let truncated = truncate_chars(&collapsed, 512);
    (
        row.source_code.to_lowercase(),
        row.sense_number.unwrap_or(-1),
        row.normalized_word.to_lowercase(),
        truncated,
    )
}

/// Sanitize and within-batch-dedupe a set of raw entries, without touching
/// the database. Exposed separately from [`StagingLoader::load`] so the
/// gating logic is independently testable.
#[must_use]
pub fn sanitize_and_dedupe(entries: &[RawEntry]) -> (Vec<StagingRow>, LoadReport) {
    let mut report = LoadReport::default();
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for entry in entries {
        let Some(row) = sanitize(entry) else {
            report.dropped_invalid += 1;
            continue;
        };
        report.sanitized += 1;
        let key = within_batch_key(&row);
        if !seen.insert(key) {
            report.deduplicated_within_batch += 1;
            continue;
        }
        rows.push(row);
    }
    (rows, report)
}

/// Staging loader: sanitize/hash/dedupe/persist, then finalize.
pub struct StagingLoader {
    pool: Arc<DbPool>,
    batch_size: std::sync::atomic::AtomicUsize,
}

impl StagingLoader {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self {
            pool,
            batch_size: std::sync::atomic::AtomicUsize::new(MIN_BATCH_SIZE),
        }
    }

    #[must_use]
    pub fn current_batch_size(&self) -> usize {
        self.batch_size.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Sanitize, dedupe, and persist `entries` in one logical batch.
    /// Never rethrows on a plain DB failure (rolls back, logs, returns a
    /// report with `inserted = 0`); cancellation rethrows after rollback.
    pub fn load(&self, cx: &Cx, entries: &[RawEntry]) -> Outcome<LoadReport, DbError> {
        if cx.is_cancelled() {
            return Outcome::Cancelled;
        }

        let (rows, mut report) = sanitize_and_dedupe(entries);
        if rows.is_empty() {
            return Outcome::Ok(report);
        }

        let started = Instant::now();
        match self.persist(&rows) {
            Ok(inserted) => {
                report.inserted = inserted;
                self.adapt_batch_size(started.elapsed());
                Outcome::Ok(report)
            }
            Err(e) if cx.is_cancelled() => {
                tracing::warn!(error = %e, "staging load cancelled during persist");
                Outcome::Cancelled
            }
            Err(e) => {
                tracing::error!(error = %e, "staging load failed, rolled back");
                Outcome::Ok(report)
            }
        }
    }

    fn persist(&self, rows: &[StagingRow]) -> DbResult<usize> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        let tx = conn.begin().map_err(|e| DbError::Sql(e.to_string()))?;

        tx.execute(
            "CREATE TEMP TABLE IF NOT EXISTS staging_temp_load (
                source_code TEXT, word TEXT, normalized_word TEXT, part_of_speech TEXT,
                definition TEXT, etymology TEXT, sense_number INTEGER, raw_fragment TEXT,
                created_utc INTEGER, word_hash TEXT, definition_hash TEXT
            )",
            &[],
        )
        .map_err(|e| DbError::Sql(e.to_string()))?;
        tx.execute(
            "CREATE INDEX IF NOT EXISTS ix_staging_temp_dedup
                ON staging_temp_load (source_code, word_hash, definition_hash, sense_number)",
            &[],
        )
        .map_err(|e| DbError::Sql(e.to_string()))?;
        tx.execute("DELETE FROM staging_temp_load", &[])
            .map_err(|e| DbError::Sql(e.to_string()))?;

        for row in rows {
            tx.execute(
                "INSERT INTO staging_temp_load
                    (source_code, word, normalized_word, part_of_speech, definition, etymology,
                     sense_number, raw_fragment, created_utc, word_hash, definition_hash)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    row.source_code.as_str().into(),
                    row.word.as_str().into(),
                    row.normalized_word.as_str().into(),
                    row.part_of_speech.as_deref().into(),
                    row.definition.as_str().into(),
                    row.etymology.as_deref().into(),
                    row.sense_number.unwrap_or(-1).into(),
                    row.raw_fragment.as_deref().into(),
                    row.created_utc.into(),
                    row.word_hash.as_str().into(),
                    row.definition_hash.as_str().into(),
                ],
            )
            .map_err(|e| DbError::Sql(e.to_string()))?;
        }

        let inserted = tx
            .execute(
                "INSERT INTO dictionary_entry_staging
                    (source_code, word, normalized_word, part_of_speech, definition, etymology,
                     sense_number, raw_fragment, word_hash, definition_hash, created_utc)
                 SELECT t.source_code, t.word, t.normalized_word, t.part_of_speech, t.definition,
                        t.etymology, t.sense_number, t.raw_fragment, t.word_hash, t.definition_hash,
                        t.created_utc
                 FROM staging_temp_load t
                 WHERE NOT EXISTS (
                    SELECT 1 FROM dictionary_entry_staging s
                    WHERE s.source_code = t.source_code
                      AND s.word_hash = t.word_hash
                      AND s.definition_hash = t.definition_hash
                      AND COALESCE(s.sense_number, -1) = COALESCE(t.sense_number, -1)
                 )",
                &[],
            )
            .map_err(|e| DbError::Sql(e.to_string()))?;

        tx.commit().map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(inserted as usize)
    }

    fn adapt_batch_size(&self, elapsed: std::time::Duration) {
        use std::sync::atomic::Ordering;
        if elapsed < GROW_THRESHOLD {
            self.batch_size
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                    Some((v + GROW_STEP).min(MAX_BATCH_SIZE))
                })
                .ok();
        } else if elapsed > SHRINK_THRESHOLD {
            self.batch_size
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                    Some(v.saturating_sub(SHRINK_STEP).max(MIN_BATCH_SIZE))
                })
                .ok();
        }
    }

    /// Mark `source_code` complete; returns whether every configured source
    /// is now complete.
    pub fn mark_source_completed(&self, source_code: &str) -> DbResult<bool> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        conn.execute(
            "INSERT INTO dictionary_import_source_status (source_code, completed_utc)
             VALUES (?, ?)
             ON CONFLICT(source_code) DO UPDATE SET completed_utc = excluded.completed_utc",
            &[source_code.into(), now_micros().into()],
        )
        .map_err(|e| DbError::Sql(e.to_string()))?;

        let incomplete: i64 = conn
            .query_scalar(
                "SELECT COUNT(*) FROM dictionary_import_source_status WHERE completed_utc IS NULL",
                &[],
            )
            .map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(incomplete == 0)
    }

    /// Move staged rows for `source_code` into canonical tables under a
    /// cross-process advisory lock. The only method in this core permitted
    /// to raise upward after exhausting retries.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::FinalizeFailed`] after exhausting the lock-busy and
    /// deadlock retry budgets.
    pub fn try_finalize(&self, source_code: &str) -> DbResult<()> {
        let policy = FinalizeRetryPolicy::default();
        let source_code = source_code.to_string();
        let pool = Arc::clone(&self.pool);

        retry_finalize(&policy, move || {
            let conn = pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
            conn.execute("SELECT finalize_source(?)", &[source_code.as_str().into()])
                .map_err(|e| DbError::Sql(e.to_string()))
        })
        .map(|(_, _)| ())
        .map_err(|e| match e {
            DbError::Sql(_) | DbError::ResourceBusy { .. } => DbError::FinalizeFailed {
                source_code: source_code.clone(),
                attempts: policy.max_lock_busy_retries,
                message: e.to_string(),
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(word: &str, def: &str, source: &str) -> RawEntry {
        RawEntry {
            word: word.into(),
            normalized_word: word.to_lowercase(),
            part_of_speech: None,
            definition: def.into(),
            etymology: None,
            sense_number: None,
            raw_fragment: None,
            source_code: source.into(),
            created_utc: now_micros(),
        }
    }

    #[test]
    fn blank_word_or_definition_is_dropped() {
        let entries = vec![sample("  ", "a definition", "WEB"), sample("cat", "  ", "WEB")];
        let (rows, report) = sanitize_and_dedupe(&entries);
        assert!(rows.is_empty());
        assert_eq!(report.dropped_invalid, 2);
    }

    #[test]
    fn duplicate_within_batch_is_collapsed() {
        let entries = vec![
            sample("cat", "a small feline", "WEB"),
            sample("cat", "a small   feline", "web"),
        ];
        let (rows, report) = sanitize_and_dedupe(&entries);
        assert_eq!(rows.len(), 1);
        assert_eq!(report.deduplicated_within_batch, 1);
    }

    #[test]
    fn blank_source_code_defaults_to_unknown() {
        let entries = vec![sample("cat", "a small feline", "   ")];
        let (rows, _) = sanitize_and_dedupe(&entries);
        assert_eq!(rows[0].source_code, "UNKNOWN");
    }

    #[test]
    fn below_epoch_timestamp_is_coerced() {
        let mut entry = sample("cat", "a small feline", "WEB");
        entry.created_utc = -1;
        let row = sanitize(&entry).unwrap();
        assert!(row.created_utc > 0);
    }

    #[test]
    fn dedup_key_is_case_insensitive_and_whitespace_collapsed() {
        let a = sanitize(&sample("Cat", "a  small feline", "web")).unwrap();
        let b = sanitize(&sample("cat", "a small   feline", "WEB")).unwrap();
        assert_eq!(within_batch_key(&a), within_batch_key(&b));
    }
}
