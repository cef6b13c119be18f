//! Parsed-definition and child-row writers (Component F).
//!
//! Every child writer funnels its guarded insert through the shared
//! [`Batcher`] from Component D; the only thing that varies per kind is the
//! table, the uniqueness scope, and the normalization rule applied to the
//! payload before it is classified and (if non-English) routed through
//! Component C.

use crate::batcher::{Batcher, BatchRow};
use crate::error::DbError;
use crate::nonenglish::{FieldType, NonEnglishStore};
use crate::pool::DbPool;
use dictionary_core::sentinels::{bounds, truncate_chars, BILINGUAL_EXAMPLE, NON_ENGLISH};
use dictionary_text::lang::contains_non_english;
use once_cell::sync::Lazy;
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::models::ParsedDefinition;

/// Fixed domain short-code lexicon (§4.F). Unknown domains fall back to an
/// upper-cased, truncated form rather than being dropped.
static DOMAIN_CODES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("american", "AM"),
        ("us", "US"),
        ("british", "BRIT"),
        ("formal", "FORMAL"),
        ("informal", "INFORMAL"),
        ("literary", "LITERARY"),
        ("slang", "SLANG"),
        ("archaic", "ARCHAIC"),
        ("dialect", "DIALECT"),
        ("technical", "TECH"),
        ("medical", "MED"),
        ("legal", "LEGAL"),
        ("nautical", "NAUT"),
        ("military", "MIL"),
    ])
});

static USAGE_LABEL_CODES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("noncount", "N-UNCOUNT"),
        ("count", "N-COUNT"),
        ("verb", "VERB"),
        ("adjective", "ADJ"),
        ("adverb", "ADV"),
        ("noun", "NOUN"),
        ("pronoun", "PRON"),
        ("preposition", "PREP"),
        ("conjunction", "CONJ"),
        ("interjection", "INTERJ"),
        ("transitive", "TR"),
        ("intransitive", "INTR"),
    ])
});

fn lexicon_code(table: &HashMap<&'static str, &'static str>, raw: &str, max_len: usize) -> Option<String> {
    let key = raw.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    if let Some(code) = table.get(key.as_str()) {
        return Some((*code).to_string());
    }
    Some(truncate_chars(&key.to_uppercase(), max_len))
}

/// Writer for `DictionaryEntryParsed` rows.
pub struct ParsedDefinitionWriter {
    pool: Arc<DbPool>,
}

impl ParsedDefinitionWriter {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Idempotent upsert keyed on `(entryId, parentParsedId, meaningTitle,
    /// senseNumber)`. Returns the id of the inserted or pre-existing row.
    /// Retries once with aggressively shortened values on a truncation error.
    pub fn write(
        &self,
        entry_id: i64,
        parsed: &ParsedDefinition,
        parent_parsed_id: Option<i64>,
    ) -> Option<i64> {
        let meaning_title = if parsed.meaning_title.trim().is_empty() {
            ParsedDefinition::DEFAULT_MEANING_TITLE.to_string()
        } else {
            truncate_chars(parsed.meaning_title.trim(), bounds::WORD)
        };
        let domain_code = parsed
            .domain_code
            .as_deref()
            .and_then(|d| lexicon_code(&DOMAIN_CODES, d, bounds::DOMAIN_CODE));
        let usage_label = parsed
            .usage_label
            .as_deref()
            .and_then(|d| lexicon_code(&USAGE_LABEL_CODES, d, bounds::USAGE_LABEL));
        let definition = truncate_chars(parsed.definition.trim(), bounds::DEFINITION);
        let raw_fragment = parsed
            .raw_fragment
            .as_deref()
            .map(|s| truncate_chars(s, bounds::RAW_FRAGMENT));

        let attempt = self.try_insert(
            entry_id,
            parent_parsed_id,
            &meaning_title,
            parsed.sense_number,
            domain_code.as_deref(),
            usage_label.as_deref(),
            &definition,
            raw_fragment.as_deref(),
        );

        match attempt {
            Ok(id) => Some(id),
            Err(DbError::Truncation(_)) => {
                let short_title = truncate_chars(&meaning_title, 50);
                let short_def = truncate_chars(&definition, 500);
                self.try_insert(
                    entry_id,
                    parent_parsed_id,
                    &short_title,
                    parsed.sense_number,
                    domain_code.as_deref(),
                    usage_label.as_deref(),
                    &short_def,
                    None,
                )
                .ok()
            }
            Err(e) => {
                tracing::debug!(error = %e, entry_id, "parsed definition write failed");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_insert(
        &self,
        entry_id: i64,
        parent_parsed_id: Option<i64>,
        meaning_title: &str,
        sense_number: Option<i64>,
        domain_code: Option<&str>,
        usage_label: Option<&str>,
        definition: &str,
        raw_fragment: Option<&str>,
    ) -> Result<i64, DbError> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        conn.execute(
            "INSERT INTO dictionary_entry_parsed
                (entry_id, parent_parsed_id, meaning_title, sense_number, domain_code,
                 usage_label, definition, raw_fragment, created_utc)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (entry_id, parent_parsed_id, meaning_title, sense_number) DO NOTHING",
            &[
                entry_id.into(),
                parent_parsed_id.into(),
                meaning_title.into(),
                sense_number.into(),
                domain_code.into(),
                usage_label.into(),
                definition.into(),
                raw_fragment.into(),
                dictionary_core::timestamps::now_micros().into(),
            ],
        )
        .map_err(|e| classify_write_error(&e.to_string()))?;

        conn.query_scalar(
            "SELECT id FROM dictionary_entry_parsed
             WHERE entry_id = ? AND parent_parsed_id IS ? AND meaning_title = ? AND sense_number IS ?",
            &[
                entry_id.into(),
                parent_parsed_id.into(),
                meaning_title.into(),
                sense_number.into(),
            ],
        )
        .map_err(|e| DbError::Sql(e.to_string()))
    }
}

fn classify_write_error(message: &str) -> DbError {
    let lower = message.to_lowercase();
    if lower.contains("too long") || lower.contains("truncat") {
        DbError::Truncation(message.to_string())
    } else {
        DbError::Sql(message.to_string())
    }
}

/// Which child table a [`ChildWriter::write`] call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Alias,
    Synonym,
    Example,
    Variant,
    CrossReference,
    Etymology,
}

impl ChildKind {
    const fn field_type(self) -> FieldType {
        match self {
            Self::Alias => FieldType::Alias,
            Self::Synonym => FieldType::Synonym,
            Self::Example => FieldType::Example,
            Self::Variant => FieldType::Variant,
            Self::CrossReference => FieldType::CrossReference,
            Self::Etymology => FieldType::Etymology,
        }
    }

    /// Whether the insert is scoped to a parsed-definition row as well as an
    /// entry row. Examples are scoped by both; variants and etymologies are
    /// entry-only; the rest are parsed-only.
    const fn scoped_by_parsed(self) -> bool {
        matches!(self, Self::Alias | Self::Synonym | Self::Example | Self::CrossReference)
    }

    const fn scoped_by_entry(self) -> bool {
        matches!(self, Self::Example | Self::Variant | Self::Etymology)
    }

    const fn table(self) -> &'static str {
        match self {
            Self::Alias => "dictionary_entry_alias",
            Self::Synonym => "dictionary_entry_synonym",
            Self::Example => "dictionary_entry_example",
            Self::Variant => "dictionary_entry_variant",
            Self::CrossReference => "dictionary_entry_cross_reference",
            Self::Etymology => "dictionary_entry_etymology",
        }
    }

    /// Template text, expressed as `@Name`-token SQL the batcher rewrites per
    /// batch slot. Column layout depends on `scoped_by_parsed`/`scoped_by_entry`.
    fn template(self) -> String {
        let table = self.table();
        match (self.scoped_by_parsed(), self.scoped_by_entry()) {
            (true, true) => format!(
                "INSERT INTO {table}
                    (parsed_id, entry_id, source_code, text, has_non_english_text, non_english_text_id)
                 SELECT @ParsedId, @EntryId, @SourceCode, @Text, @HasNonEnglish, @NonEnglishId
                 WHERE NOT EXISTS (
                    SELECT 1 FROM {table} WHERE entry_id = @EntryId AND source_code = @SourceCode AND text = @Text
                 )"
            ),
            (true, false) => format!(
                "INSERT INTO {table}
                    (parsed_id, source_code, text, has_non_english_text, non_english_text_id)
                 SELECT @ParsedId, @SourceCode, @Text, @HasNonEnglish, @NonEnglishId
                 WHERE NOT EXISTS (
                    SELECT 1 FROM {table} WHERE parsed_id = @ParsedId AND source_code = @SourceCode AND text = @Text
                 )"
            ),
            (false, true) => format!(
                "INSERT INTO {table}
                    (entry_id, source_code, text, has_non_english_text, non_english_text_id)
                 SELECT @EntryId, @SourceCode, @Text, @HasNonEnglish, @NonEnglishId
                 WHERE NOT EXISTS (
                    SELECT 1 FROM {table} WHERE entry_id = @EntryId AND source_code = @SourceCode AND text = @Text
                 )"
            ),
            (false, false) => unreachable!("every child kind is scoped by parsed, entry, or both"),
        }
    }
}

/// Normalize a child payload per §4.F: trim and collapse whitespace always;
/// lowercase target words (alias/synonym/variant); strip bracket-pipe wiki
/// markup for cross-references (`[[target|label]]` → `label`).
#[must_use]
pub fn normalize_child_text(kind: ChildKind, raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match kind {
        ChildKind::Alias | ChildKind::Synonym | ChildKind::Variant => collapsed.to_lowercase(),
        ChildKind::CrossReference => strip_wiki_markup(&collapsed),
        ChildKind::Example | ChildKind::Etymology => collapsed,
    }
}

fn strip_wiki_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '[' && chars.peek() == Some(&'[') {
            chars.next();
            let mut link = String::new();
            while let Some(&next) = chars.peek() {
                if next == ']' {
                    chars.next();
                    if chars.peek() == Some(&']') {
                        chars.next();
                    }
                    break;
                }
                link.push(next);
                chars.next();
            }
            let display = link.rsplit('|').next().unwrap_or(&link);
            out.push_str(display);
        } else {
            out.push(c);
        }
    }
    out
}

struct ChildInsertRow {
    operation_key: String,
    template: String,
    parsed_id: Option<i64>,
    entry_id: i64,
    source_code: String,
    text: String,
    has_non_english: bool,
    non_english_id: Option<i64>,
    kind: ChildKind,
}

impl BatchRow for ChildInsertRow {
    fn operation_key(&self) -> &str {
        &self.operation_key
    }

    fn sql_template(&self) -> &str {
        &self.template
    }

    fn parameters(&self) -> Vec<JsonValue> {
        let has_non_english = json!(self.has_non_english);
        let non_english_id = self.non_english_id.map_or(JsonValue::Null, |id| json!(id));
        match (self.kind.scoped_by_parsed(), self.kind.scoped_by_entry()) {
            (true, true) => vec![
                json!(self.parsed_id),
                json!(self.entry_id),
                json!(self.source_code),
                json!(self.text),
                has_non_english,
                non_english_id,
            ],
            (true, false) => vec![
                json!(self.parsed_id),
                json!(self.source_code),
                json!(self.text),
                has_non_english,
                non_english_id,
            ],
            (false, true) => vec![
                json!(self.entry_id),
                json!(self.source_code),
                json!(self.text),
                has_non_english,
                non_english_id,
            ],
            (false, false) => Vec::new(),
        }
    }
}

/// Shared writer for alias/synonym/example/variant/crossReference/etymology
/// child rows, funneled through the batcher and the non-English side-store.
pub struct ChildWriter {
    batcher: Arc<Batcher>,
    non_english: Arc<NonEnglishStore>,
}

impl ChildWriter {
    #[must_use]
    pub fn new(batcher: Arc<Batcher>, non_english: Arc<NonEnglishStore>) -> Self {
        Self { batcher, non_english }
    }

    /// Write one child row. Returns `false` (the benign default, per §7's
    /// fatal-vs-absorbed error policy) on a blank payload, a forbidden
    /// placeholder, or a batcher failure — never propagates.
    pub fn write(
        &self,
        kind: ChildKind,
        parsed_id: Option<i64>,
        entry_id: i64,
        source_code: &str,
        raw_text: &str,
    ) -> bool {
        let normalized = normalize_child_text(kind, raw_text);
        if normalized.is_empty() || normalized == NON_ENGLISH || normalized == BILINGUAL_EXAMPLE {
            return false;
        }

        let (stored_text, has_non_english, non_english_id) = if contains_non_english(&normalized) {
            let id = self.non_english.store(&normalized, source_code, kind.field_type());
            (NON_ENGLISH.to_string(), id.is_some(), id)
        } else {
            (normalized, false, None)
        };

        let row = ChildInsertRow {
            operation_key: format!("child_write:{}", kind.table()),
            template: kind.template(),
            parsed_id,
            entry_id,
            source_code: source_code.to_string(),
            text: stored_text,
            has_non_english,
            non_english_id,
            kind,
        };

        match self.batcher.queue(&row) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, kind = ?kind, "child row write failed");
                false
            }
        }
    }

    /// Partition `synonyms` by language, dedupe English entries
    /// case-insensitively, and write each surviving row. Stands in for the
    /// teacher's table-valued bulk insert: the batcher's per-key coalescing
    /// already gives the same one-round-trip effect in this stack.
    pub fn write_for_parsed_definition(
        &self,
        parsed_id: i64,
        entry_id: i64,
        source_code: &str,
        synonyms: &[String],
    ) -> usize {
        self.bulk_write(parsed_id, entry_id, source_code, synonyms)
    }

    pub fn bulk_write(
        &self,
        parsed_id: i64,
        entry_id: i64,
        source_code: &str,
        synonyms: &[String],
    ) -> usize {
        let mut english = Vec::new();
        let mut non_english = Vec::new();
        let mut seen_english = HashSet::new();

        for raw in synonyms {
            let normalized = normalize_child_text(ChildKind::Synonym, raw);
            if normalized.is_empty() || normalized == NON_ENGLISH || normalized == BILINGUAL_EXAMPLE {
                continue;
            }
            if contains_non_english(&normalized) {
                non_english.push(normalized);
            } else if seen_english.insert(normalized.clone()) {
                english.push(normalized);
            }
        }

        let mut written = 0usize;
        for text in english.into_iter().chain(non_english) {
            if self.write(ChildKind::Synonym, Some(parsed_id), entry_id, source_code, &text) {
                written += 1;
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicon_maps_known_domain_to_short_code() {
        assert_eq!(lexicon_code(&DOMAIN_CODES, "American", bounds::DOMAIN_CODE), Some("AM".to_string()));
    }

    #[test]
    fn lexicon_falls_back_to_truncated_upper_case_for_unknown_domain() {
        assert_eq!(
            lexicon_code(&DOMAIN_CODES, "astrophysics", bounds::DOMAIN_CODE),
            Some("ASTROPHYSICS".to_string())
        );
    }

    #[test]
    fn normalize_lowercases_synonyms_and_collapses_whitespace() {
        assert_eq!(normalize_child_text(ChildKind::Synonym, "  Big   Cat "), "big cat");
    }

    #[test]
    fn normalize_strips_wiki_markup_from_cross_references() {
        assert_eq!(
            normalize_child_text(ChildKind::CrossReference, "see [[Feline|cat family]] entry"),
            "see cat family entry"
        );
        assert_eq!(
            normalize_child_text(ChildKind::CrossReference, "see [[Feline]] entry"),
            "see Feline entry"
        );
    }

    #[test]
    fn example_kind_is_scoped_by_both_parsed_and_entry() {
        assert!(ChildKind::Example.scoped_by_parsed());
        assert!(ChildKind::Example.scoped_by_entry());
        assert!(!ChildKind::Variant.scoped_by_parsed());
    }

    #[test]
    fn template_contains_guarded_not_exists_clause() {
        let template = ChildKind::Alias.template();
        assert!(template.contains("WHERE NOT EXISTS"));
    }
}
