//! Incremental rewrite-memory index builder (Component G).
//!
//! One Tantivy index holds every source's rewrite history; `SourceCode` and
//! `Mode` keyword fields discriminate within it. Progress is tracked by a
//! small `_index_state.json` file beside the index segments so a re-run only
//! picks up annotations newer than the last build.

use crate::error::RewriteMemoryResult;
use dictionary_db::{DbError, DbPool};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tantivy::schema::{
    Field, IndexRecordOption, Schema, SchemaBuilder, TextFieldIndexing, TextOptions, FAST, INDEXED,
    STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use tantivy::{doc, Index, IndexWriter};

pub const TOKENIZER_NAME: &str = "rewrite_default";
pub const STATE_FILE_NAME: &str = "_index_state.json";
const TEXT_TRUNCATE_CHARS: usize = 800;
const WRITER_HEAP_BYTES: usize = 15_000_000;

/// One index tuple's rewrite mode, per §4.G step 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Definition,
    MeaningTitle,
    Example,
}

impl IndexMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Definition => "Definition",
            Self::MeaningTitle => "MeaningTitle",
            Self::Example => "Example",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldHandles {
    pub source_code: Field,
    pub mode: Field,
    pub original_text: Field,
    pub original_text_hash: Field,
    pub enhanced_text: Field,
    pub seq: Field,
}

#[must_use]
pub fn build_schema() -> (Schema, FieldHandles) {
    let mut builder = SchemaBuilder::new();
    let text_options = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER_NAME)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );

    let source_code = builder.add_text_field("source_code", STRING | STORED | FAST);
    let mode = builder.add_text_field("mode", STRING | STORED | FAST);
    let original_text = builder.add_text_field("original_text", text_options | STORED);
    let original_text_hash = builder.add_text_field("original_text_hash", STRING | STORED);
    let enhanced_text = builder.add_text_field("enhanced_text", STORED);
    let seq = builder.add_u64_field("seq", INDEXED | STORED | FAST);

    let schema = builder.build();
    let handles = FieldHandles {
        source_code,
        mode,
        original_text,
        original_text_hash,
        enhanced_text,
        seq,
    };
    (schema, handles)
}

pub fn register_tokenizer(index: &Index) {
    let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(RemoveLongFilter::limit(256))
        .build();
    index.tokenizers().register(TOKENIZER_NAME, analyzer);
}

/// Open the rewrite-memory index at `dir`, creating it (and the directory)
/// if absent.
///
/// # Errors
///
/// Returns [`RewriteMemoryError::Index`] if Tantivy fails to open or create.
pub fn open_or_create(dir: &Path) -> RewriteMemoryResult<(Index, FieldHandles)> {
    let (schema, handles) = build_schema();
    let index = if dir.join("meta.json").exists() {
        Index::open_in_dir(dir)?
    } else {
        std::fs::create_dir_all(dir)?;
        Index::create_in_dir(dir, schema)?
    };
    register_tokenizer(&index);
    Ok((index, handles))
}

/// Progress checkpoint persisted beside the index segments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexState {
    pub source_code: String,
    pub last_indexed_parsed_definition_id: i64,
    pub last_indexed_utc: i64,
}

impl IndexState {
    fn initial(source_code: &str) -> Self {
        Self {
            source_code: source_code.to_string(),
            last_indexed_parsed_definition_id: 0,
            last_indexed_utc: 0,
        }
    }

    fn path(dir: &Path) -> PathBuf {
        dir.join(STATE_FILE_NAME)
    }

    fn load(dir: &Path, source_code: &str) -> Self {
        let path = Self::path(dir);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Self::initial(source_code);
        };
        serde_json::from_str(&raw).unwrap_or_else(|_| Self::initial(source_code))
    }

    fn save(&self, dir: &Path) -> RewriteMemoryResult<()> {
        let path = Self::path(dir);
        let tmp = dir.join(format!("{STATE_FILE_NAME}.tmp"));
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// One row fetched from the database join described by §4.G step 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub parsed_definition_id: i64,
    pub source_code: String,
    pub original_definition: String,
    pub ai_enhanced_definition: String,
    pub meaning_title: Option<String>,
    pub ai_notes_json: String,
}

/// One normalized (mode, original, enhanced, hash) tuple ready for indexing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IndexTuple {
    source_code: String,
    mode: &'static str,
    original: String,
    enhanced: String,
    hash: String,
}

fn normalize_for_index(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    dictionary_core::sentinels::truncate_chars(&collapsed, TEXT_TRUNCATE_CHARS)
}

fn tuples_for_row(row: &AnnotationRow) -> Vec<IndexTuple> {
    let mut tuples = Vec::new();

    if row.original_definition.trim() != row.ai_enhanced_definition.trim()
        && !row.original_definition.trim().is_empty()
        && !row.ai_enhanced_definition.trim().is_empty()
    {
        let original = normalize_for_index(&row.original_definition);
        let enhanced = normalize_for_index(&row.ai_enhanced_definition);
        tuples.push(IndexTuple {
            source_code: row.source_code.clone(),
            mode: IndexMode::Definition.as_str(),
            hash: dictionary_text::sha256_hex(&original),
            original,
            enhanced,
        });
    }

    if let Some(notes) = parse_notes(&row.ai_notes_json) {
        if let Some(title) = notes.title {
            let original = normalize_for_index(&title.original);
            let enhanced = normalize_for_index(&title.enhanced);
            if !original.is_empty() && original != enhanced {
                tuples.push(IndexTuple {
                    source_code: row.source_code.clone(),
                    mode: IndexMode::MeaningTitle.as_str(),
                    hash: dictionary_text::sha256_hex(&original),
                    original,
                    enhanced,
                });
            }
        } else if let Some(title) = row.meaning_title.as_deref() {
            let original = normalize_for_index(title);
            if !original.is_empty() {
                tuples.push(IndexTuple {
                    source_code: row.source_code.clone(),
                    mode: IndexMode::MeaningTitle.as_str(),
                    hash: dictionary_text::sha256_hex(&original),
                    enhanced: original.clone(),
                    original,
                });
            }
        }

        for example in notes.examples.into_iter().take(20) {
            let original = normalize_for_index(&example.original);
            let enhanced = normalize_for_index(&example.enhanced);
            if original.is_empty() || original == enhanced {
                continue;
            }
            tuples.push(IndexTuple {
                source_code: row.source_code.clone(),
                mode: IndexMode::Example.as_str(),
                hash: dictionary_text::sha256_hex(&original),
                original,
                enhanced,
            });
        }
    }

    tuples
}

fn parse_notes(raw: &str) -> Option<dictionary_db::models::AiNotes> {
    serde_json::from_str(raw).ok()
}

/// Incremental index builder, tied to one on-disk directory.
pub struct IndexBuilder {
    dir: PathBuf,
    pool: Arc<DbPool>,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(dir: PathBuf, pool: Arc<DbPool>) -> Self {
        Self { dir, pool }
    }

    /// Run one incremental build pass for `source_code`, bounded by `take`
    /// (clamped to 1..=5000). Returns the number of tuples written. Never
    /// raises: any failure is logged and treated as zero progress.
    pub fn build_incremental(&self, source_code: &str, take: usize) -> usize {
        let take = take.clamp(1, 5000);
        match self.try_build(source_code, take) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, source_code, "rewrite-memory index build failed");
                0
            }
        }
    }

    fn try_build(&self, source_code: &str, take: usize) -> RewriteMemoryResult<usize> {
        let state = IndexState::load(&self.dir, source_code);
        let rows = self.fetch_annotations_after(source_code, state.last_indexed_parsed_definition_id, take)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tuples: Vec<IndexTuple> = rows.iter().flat_map(tuples_for_row).collect();
        tuples.sort();

        let (index, handles) = open_or_create(&self.dir)?;
        let mut writer: IndexWriter = index.writer(WRITER_HEAP_BYTES)?;
        for (seq, tuple) in tuples.iter().enumerate() {
            writer.add_document(doc!(
                handles.source_code => tuple.source_code.as_str(),
                handles.mode => tuple.mode,
                handles.original_text => tuple.original.as_str(),
                handles.original_text_hash => tuple.hash.as_str(),
                handles.enhanced_text => tuple.enhanced.as_str(),
                handles.seq => seq as u64,
            ))?;
        }
        writer.commit()?;

        let max_id = rows.iter().map(|r| r.parsed_definition_id).max().unwrap_or(state.last_indexed_parsed_definition_id);
        let new_state = IndexState {
            source_code: source_code.to_string(),
            last_indexed_parsed_definition_id: max_id,
            last_indexed_utc: dictionary_core::timestamps::now_micros(),
        };
        new_state.save(&self.dir)?;

        Ok(tuples.len())
    }

    fn fetch_annotations_after(
        &self,
        source_code: &str,
        after_id: i64,
        take: usize,
    ) -> RewriteMemoryResult<Vec<AnnotationRow>> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        let sql = "SELECT a.parsed_definition_id, a.source_code, a.original_definition, \
                          a.ai_enhanced_definition, p.meaning_title, a.ai_notes_json \
                   FROM dictionary_entry_ai_annotation a \
                   JOIN dictionary_entry_parsed p ON p.id = a.parsed_definition_id \
                   WHERE a.source_code = ? AND a.parsed_definition_id > ? \
                   ORDER BY a.parsed_definition_id ASC LIMIT ?";
        let rows = conn
            .query_many(
                sql,
                &[
                    source_code.into(),
                    after_id.into(),
                    (take as i64).into(),
                ],
            )
            .map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> AnnotationRow {
        AnnotationRow {
            parsed_definition_id: 1,
            source_code: "WEB".into(),
            original_definition: "a small feline   animal".into(),
            ai_enhanced_definition: "A small domesticated feline.".into(),
            meaning_title: Some("cat".into()),
            ai_notes_json: serde_json::json!({
                "examples": [
                    {"original": "the cat sat", "enhanced": "the cat sat quietly"}
                ]
            })
            .to_string(),
        }
    }

    #[test]
    fn normalize_collapses_whitespace_and_truncates() {
        let long = "a".repeat(2000);
        let normalized = normalize_for_index(&long);
        assert_eq!(normalized.chars().count(), TEXT_TRUNCATE_CHARS);
    }

    #[test]
    fn tuples_for_row_emits_definition_and_example_modes() {
        let tuples = tuples_for_row(&sample_row());
        let modes: Vec<&str> = tuples.iter().map(|t| t.mode).collect();
        assert!(modes.contains(&"Definition"));
        assert!(modes.contains(&"Example"));
    }

    #[test]
    fn tuples_for_row_skips_identical_original_and_enhanced() {
        let mut row = sample_row();
        row.ai_enhanced_definition = row.original_definition.clone();
        row.ai_notes_json = "{}".to_string();
        let tuples = tuples_for_row(&row);
        assert!(tuples.iter().all(|t| t.mode != "Definition"));
    }

    #[test]
    fn index_state_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let state = IndexState {
            source_code: "WEB".into(),
            last_indexed_parsed_definition_id: 42,
            last_indexed_utc: 123,
        };
        state.save(dir.path()).unwrap();
        let loaded = IndexState::load(dir.path(), "WEB");
        assert_eq!(loaded, state);
    }

    #[test]
    fn index_state_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = IndexState::load(dir.path(), "WEB");
        assert_eq!(loaded.last_indexed_parsed_definition_id, 0);
    }
}
