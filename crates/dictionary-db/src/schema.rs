//! Schema definitions (DDL) for every table this core reads or writes.
//!
//! Tables are created idempotently (`CREATE TABLE IF NOT EXISTS`) on pool
//! initialization. This core does not own forward migrations; it only
//! guarantees its own tables exist.

use crate::error::DbResult;
use crate::pool::DbPool;

/// Statements applied once on startup, in order. Grouped by the component
/// that owns the table.
pub const DDL_STATEMENTS: &[&str] = &[
    // Component E: staging
    r"CREATE TABLE IF NOT EXISTS dictionary_entry_staging (
        id INTEGER PRIMARY KEY,
        source_code TEXT NOT NULL,
        word TEXT NOT NULL,
        normalized_word TEXT NOT NULL,
        part_of_speech TEXT,
        definition TEXT NOT NULL,
        etymology TEXT,
        sense_number INTEGER,
        raw_fragment TEXT,
        word_hash TEXT NOT NULL,
        definition_hash TEXT NOT NULL,
        created_utc INTEGER NOT NULL
    )",
    r"CREATE UNIQUE INDEX IF NOT EXISTS ix_staging_dedup
        ON dictionary_entry_staging (source_code, word_hash, definition_hash, sense_number)",
    r"CREATE TABLE IF NOT EXISTS dictionary_import_source_status (
        source_code TEXT PRIMARY KEY,
        completed_utc INTEGER
    )",
    // Component F: canonical entries and children
    r"CREATE TABLE IF NOT EXISTS dictionary_entry (
        id INTEGER PRIMARY KEY,
        source_code TEXT NOT NULL,
        normalized_word TEXT NOT NULL,
        part_of_speech TEXT,
        part_of_speech_confidence INTEGER,
        UNIQUE (source_code, normalized_word)
    )",
    r"CREATE TABLE IF NOT EXISTS dictionary_entry_parsed (
        id INTEGER PRIMARY KEY,
        entry_id INTEGER NOT NULL,
        parent_parsed_id INTEGER,
        meaning_title TEXT NOT NULL,
        sense_number INTEGER,
        domain_code TEXT,
        usage_label TEXT,
        definition TEXT NOT NULL,
        raw_fragment TEXT,
        created_utc INTEGER NOT NULL,
        UNIQUE (entry_id, parent_parsed_id, meaning_title, sense_number)
    )",
    r"CREATE TABLE IF NOT EXISTS dictionary_entry_alias (
        id INTEGER PRIMARY KEY,
        parsed_id INTEGER NOT NULL,
        source_code TEXT NOT NULL,
        text TEXT NOT NULL,
        has_non_english_text INTEGER NOT NULL DEFAULT 0,
        non_english_text_id INTEGER,
        UNIQUE (parsed_id, source_code, text)
    )",
    r"CREATE TABLE IF NOT EXISTS dictionary_entry_synonym (
        id INTEGER PRIMARY KEY,
        parsed_id INTEGER NOT NULL,
        source_code TEXT NOT NULL,
        text TEXT NOT NULL,
        has_non_english_text INTEGER NOT NULL DEFAULT 0,
        non_english_text_id INTEGER,
        UNIQUE (parsed_id, source_code, text)
    )",
    r"CREATE TABLE IF NOT EXISTS dictionary_entry_example (
        id INTEGER PRIMARY KEY,
        parsed_id INTEGER NOT NULL,
        entry_id INTEGER NOT NULL,
        source_code TEXT NOT NULL,
        text TEXT NOT NULL,
        has_non_english_text INTEGER NOT NULL DEFAULT 0,
        non_english_text_id INTEGER,
        UNIQUE (entry_id, source_code, text)
    )",
    r"CREATE TABLE IF NOT EXISTS dictionary_entry_variant (
        id INTEGER PRIMARY KEY,
        entry_id INTEGER NOT NULL,
        source_code TEXT NOT NULL,
        text TEXT NOT NULL,
        has_non_english_text INTEGER NOT NULL DEFAULT 0,
        non_english_text_id INTEGER,
        UNIQUE (entry_id, source_code, text)
    )",
    r"CREATE TABLE IF NOT EXISTS dictionary_entry_cross_reference (
        id INTEGER PRIMARY KEY,
        parsed_id INTEGER NOT NULL,
        source_code TEXT NOT NULL,
        text TEXT NOT NULL,
        has_non_english_text INTEGER NOT NULL DEFAULT 0,
        non_english_text_id INTEGER,
        UNIQUE (parsed_id, source_code, text)
    )",
    r"CREATE TABLE IF NOT EXISTS dictionary_entry_etymology (
        id INTEGER PRIMARY KEY,
        entry_id INTEGER NOT NULL,
        source_code TEXT NOT NULL,
        text TEXT NOT NULL,
        has_non_english_text INTEGER NOT NULL DEFAULT 0,
        non_english_text_id INTEGER,
        UNIQUE (entry_id, source_code, text)
    )",
    r"CREATE TABLE IF NOT EXISTS dictionary_entry_ai_annotation (
        id INTEGER PRIMARY KEY,
        source_code TEXT NOT NULL,
        parsed_definition_id INTEGER NOT NULL,
        original_definition TEXT NOT NULL,
        ai_enhanced_definition TEXT NOT NULL,
        ai_notes_json TEXT NOT NULL,
        provider TEXT,
        model TEXT,
        created_utc INTEGER NOT NULL
    )",
    r"CREATE INDEX IF NOT EXISTS ix_ai_annotation_parsed_id
        ON dictionary_entry_ai_annotation (parsed_definition_id)",
    // Component C: non-English side-store
    r"CREATE TABLE IF NOT EXISTS dictionary_non_english_text (
        id INTEGER PRIMARY KEY,
        original_text TEXT NOT NULL,
        detected_language TEXT,
        character_count INTEGER NOT NULL,
        source_code TEXT NOT NULL,
        field_type TEXT NOT NULL,
        created_utc INTEGER NOT NULL
    )",
    // Component D: batch recovery sink
    r"CREATE TABLE IF NOT EXISTS batch_recovery (
        id INTEGER PRIMARY KEY,
        operation_key TEXT NOT NULL,
        sql_template TEXT NOT NULL,
        parameters_json TEXT NOT NULL,
        error_message TEXT NOT NULL,
        operation_count INTEGER NOT NULL,
        created_utc INTEGER NOT NULL
    )",
    // Components G-K: rewrite memory
    r"CREATE TABLE IF NOT EXISTS rewrite_map_candidate (
        id INTEGER PRIMARY KEY,
        source_code TEXT NOT NULL,
        mode TEXT NOT NULL,
        from_text TEXT NOT NULL,
        to_text TEXT NOT NULL,
        suggested_count INTEGER NOT NULL,
        avg_confidence_score REAL NOT NULL,
        first_seen_utc INTEGER NOT NULL,
        last_seen_utc INTEGER NOT NULL,
        status TEXT NOT NULL,
        approved_by TEXT,
        approved_utc INTEGER,
        UNIQUE (source_code, mode, from_text, to_text)
    )",
    r"CREATE TABLE IF NOT EXISTS rewrite_rule (
        id INTEGER PRIMARY KEY,
        mode_code TEXT,
        from_text TEXT NOT NULL,
        to_text TEXT NOT NULL,
        is_whole_word INTEGER NOT NULL,
        is_regex INTEGER NOT NULL,
        priority INTEGER NOT NULL,
        enabled INTEGER NOT NULL,
        notes TEXT,
        UNIQUE (mode_code, from_text, is_whole_word, is_regex)
    )",
    r"CREATE TABLE IF NOT EXISTS rewrite_stop_word (
        word TEXT PRIMARY KEY
    )",
    r"CREATE TABLE IF NOT EXISTS rewrite_rule_hit_log (
        source_code TEXT NOT NULL,
        mode TEXT NOT NULL,
        rule_type TEXT NOT NULL,
        rule_key TEXT NOT NULL,
        hit_count INTEGER NOT NULL,
        first_hit_utc INTEGER NOT NULL,
        last_hit_utc INTEGER NOT NULL,
        PRIMARY KEY (source_code, mode, rule_type, rule_key)
    )",
];

/// Apply every DDL statement against `pool`, idempotently.
///
/// # Errors
///
/// Returns [`crate::error::DbError::Schema`] if any statement fails.
pub fn migrate(pool: &DbPool) -> DbResult<()> {
    let conn = pool.get().map_err(|e| crate::error::DbError::Pool(e.to_string()))?;
    for stmt in DDL_STATEMENTS {
        conn.execute(stmt, &[])
            .map_err(|e| crate::error::DbError::Schema(format!("{stmt}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_mentions_create() {
        for stmt in DDL_STATEMENTS {
            assert!(stmt.trim_start().to_uppercase().starts_with("CREATE"));
        }
    }
}
