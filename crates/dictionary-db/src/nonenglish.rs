//! Non-English text side-store (Component C).
//!
//! The side-store is append-only; dedup is the caller's responsibility.
//! Reads are cache-first with DB fallback; the cache is sharded the same
//! way the batcher's per-key map would be, trading the teacher's full
//! S3-FIFO LRU for a simpler append-only design (ids are monotonic and the
//! text behind an id never changes, so nothing ever needs eviction by
//! recency — see DESIGN.md).

use crate::error::{DbError, DbResult};
use crate::models::NonEnglishText;
use crate::pool::DbPool;
use dictionary_core::timestamps::now_micros;
use dictionary_text::lang::{contains_non_english, detect_language_code};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

const NUM_SHARDS: usize = 16;

fn shard_of(id: i64) -> usize {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    (hasher.finish() % NUM_SHARDS as u64) as usize
}

struct Shard {
    entries: Mutex<HashMap<i64, Arc<str>>>,
}

impl Shard {
    fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }
}

/// Field a child row's text payload is drawn from, tagging the side-store row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Definition,
    Example,
    Synonym,
    Alias,
    Variant,
    CrossReference,
    Etymology,
}

impl FieldType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Definition => "Definition",
            Self::Example => "Example",
            Self::Synonym => "Synonym",
            Self::Alias => "Alias",
            Self::Variant => "Variant",
            Self::CrossReference => "CrossReference",
            Self::Etymology => "Etymology",
        }
    }
}

/// Non-English text side-store, backed by a sharded in-process cache.
pub struct NonEnglishStore {
    pool: Arc<DbPool>,
    shards: Vec<Shard>,
}

impl NonEnglishStore {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self {
            pool,
            shards: (0..NUM_SHARDS).map(|_| Shard::new()).collect(),
        }
    }

    /// Insert `original_text` if it is classified non-English, returning the
    /// assigned id. Returns `None` when the text is English — the caller
    /// keeps the original text in the parent column in that case.
    ///
    /// Never propagates a driver failure: on error this logs at debug level
    /// and returns `None`, matching "never crash the importer".
    pub fn store(&self, original_text: &str, source_code: &str, field_type: FieldType) -> Option<i64> {
        if !contains_non_english(original_text) {
            return None;
        }

        let detected = detect_language_code(original_text).map(str::to_string);
        let created_utc = now_micros();
        let char_count = original_text.chars().count() as i64;

        let insert = "INSERT INTO dictionary_non_english_text \
            (original_text, detected_language, character_count, source_code, field_type, created_utc) \
            VALUES (?, ?, ?, ?, ?, ?)";

        let result = self.pool.get().and_then(|conn| {
            conn.execute(
                insert,
                &[
                    original_text.into(),
                    detected.as_deref().into(),
                    char_count.into(),
                    source_code.into(),
                    field_type.as_str().into(),
                    created_utc.into(),
                ],
            )?;
            conn.last_insert_rowid()
        });

        match result {
            Ok(id) => {
                self.populate_cache(id, original_text);
                Some(id)
            }
            Err(e) => {
                tracing::debug!(error = %e, "non-English side-store insert failed");
                None
            }
        }
    }

    /// Cache-first lookup, falling back to the database.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<Arc<str>> {
        if let Some(text) = self.cache_get(id) {
            return Some(text);
        }
        let row = self.fetch_one(id).ok()??;
        let text: Arc<str> = Arc::from(row.original_text.as_str());
        self.populate_cache(id, &text);
        Some(text)
    }

    /// Batch lookup: split into cache hits and misses, fetch missing ones in
    /// a single round-trip, populate the cache with the fetched rows.
    #[must_use]
    pub fn get_batch(&self, ids: &[i64]) -> HashMap<i64, Arc<str>> {
        let mut out = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();
        for &id in ids {
            if let Some(text) = self.cache_get(id) {
                out.insert(id, text);
            } else {
                missing.push(id);
            }
        }
        if missing.is_empty() {
            return out;
        }
        match self.fetch_many(&missing) {
            Ok(rows) => {
                for row in rows {
                    let text: Arc<str> = Arc::from(row.original_text.as_str());
                    self.populate_cache(row.id, &text);
                    out.insert(row.id, text);
                }
                out
            }
            Err(e) => {
                tracing::debug!(error = %e, "non-English side-store batch read failed");
                out
            }
        }
    }

    fn cache_get(&self, id: i64) -> Option<Arc<str>> {
        let shard = &self.shards[shard_of(id)];
        shard
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn populate_cache(&self, id: i64, text: &str) {
        let shard = &self.shards[shard_of(id)];
        shard
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, Arc::from(text));
    }

    fn fetch_one(&self, id: i64) -> DbResult<Option<NonEnglishText>> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        conn.query_one(
            "SELECT id, original_text, detected_language, character_count, source_code, field_type, created_utc \
             FROM dictionary_non_english_text WHERE id = ?",
            &[id.into()],
        )
        .map_err(|e| DbError::Sql(e.to_string()))
    }

    fn fetch_many(&self, ids: &[i64]) -> DbResult<Vec<NonEnglishText>> {
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, original_text, detected_language, character_count, source_code, field_type, created_utc \
             FROM dictionary_non_english_text WHERE id IN ({placeholders})"
        );
        let params: Vec<sqlmodel_core::Value> = ids.iter().map(|&id| id.into()).collect();
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        conn.query_many(&sql, &params).map_err(|e| DbError::Sql(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_as_str_matches_spec_enumeration() {
        assert_eq!(FieldType::Definition.as_str(), "Definition");
        assert_eq!(FieldType::Example.as_str(), "Example");
    }

    #[test]
    fn shard_of_is_deterministic() {
        assert_eq!(shard_of(42), shard_of(42));
    }
}
