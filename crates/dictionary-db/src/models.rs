//! Relational data-model types (§3).
//!
//! Every `*Utc` field is stored as `i64` microseconds since the Unix epoch
//! (`dictionary_core::timestamps`), not a driver-native datetime.

use serde::{Deserialize, Serialize};

/// Short opaque identifier of an input corpus. Always normalized through
/// `dictionary_core::sentinels::normalize_source_code` before storage.
pub type SourceCode = String;

/// Raw entry as it arrives at the staging loader, before sanitization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    pub word: String,
    pub normalized_word: String,
    pub part_of_speech: Option<String>,
    pub definition: String,
    pub etymology: Option<String>,
    pub sense_number: Option<i64>,
    pub raw_fragment: Option<String>,
    pub source_code: SourceCode,
    pub created_utc: i64,
}

/// A sanitized, hashed row ready for bulk-copy into the staging temp table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingRow {
    pub word: String,
    pub normalized_word: String,
    pub part_of_speech: Option<String>,
    pub definition: String,
    pub etymology: Option<String>,
    pub sense_number: Option<i64>,
    pub raw_fragment: Option<String>,
    pub source_code: SourceCode,
    pub created_utc: i64,
    pub word_hash: String,
    pub definition_hash: String,
}

impl StagingRow {
    /// The within-batch dedup key: `(sourceCode lower, senseNumber, wordHash, definitionHash)`.
    #[must_use]
    pub fn dedup_key(&self) -> (String, i64, String, String) {
        (
            self.source_code.to_lowercase(),
            self.sense_number.unwrap_or(-1),
            self.word_hash.clone(),
            self.definition_hash.clone(),
        )
    }
}

/// Canonical word: one row per `(sourceCode, normalizedWord)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub id: i64,
    pub source_code: SourceCode,
    pub normalized_word: String,
    pub part_of_speech: Option<String>,
    pub part_of_speech_confidence: Option<u8>,
}

/// A sense of an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDefinition {
    pub id: i64,
    pub entry_id: i64,
    pub parent_parsed_id: Option<i64>,
    pub meaning_title: String,
    pub sense_number: Option<i64>,
    pub domain_code: Option<String>,
    pub usage_label: Option<String>,
    pub definition: String,
    pub raw_fragment: Option<String>,
    pub created_utc: i64,
}

impl ParsedDefinition {
    pub const DEFAULT_MEANING_TITLE: &'static str = "unnamed sense";
}

/// Kind of child row, used for dedup scoping and the non-English `fieldType` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildFieldType {
    Alias,
    Synonym,
    Example,
    Variant,
    CrossReference,
    Etymology,
}

impl ChildFieldType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alias => "Alias",
            Self::Synonym => "Synonym",
            Self::Example => "Example",
            Self::Variant => "Variant",
            Self::CrossReference => "CrossReference",
            Self::Etymology => "Etymology",
        }
    }
}

/// A generic child row (alias/synonym/example/variant/crossRef/etymology).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildRow {
    pub parsed_id: Option<i64>,
    pub entry_id: i64,
    pub source_code: SourceCode,
    pub text: String,
    pub has_non_english_text: bool,
    pub non_english_text_id: Option<i64>,
}

/// Original non-English payload held by the side-store (Component C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonEnglishText {
    pub id: i64,
    pub original_text: String,
    pub detected_language: Option<String>,
    pub character_count: i64,
    pub source_code: SourceCode,
    pub field_type: String,
    pub created_utc: i64,
}

/// An AI-produced rewrite annotation, the only input the rewrite-memory
/// subsystem reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnnotation {
    pub source_code: SourceCode,
    pub parsed_definition_id: i64,
    pub original_definition: String,
    pub ai_enhanced_definition: String,
    pub ai_notes_json: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub created_utc: i64,
}

/// Structured payload carried by `aiNotesJson`: title and example rewrites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiNotes {
    #[serde(default)]
    pub title: Option<AiTextRewrite>,
    #[serde(default)]
    pub examples: Vec<AiTextRewrite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTextRewrite {
    pub original: String,
    pub enhanced: String,
}

/// Sentinel a failed batch operation is filed under for out-of-band replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecoveryRow {
    pub operation_key: String,
    pub sql_template: String,
    pub parameters_json: String,
    pub error_message: String,
    pub operation_count: usize,
    pub created_utc: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_uses_minus_one_sentinel_for_missing_sense_number() {
        let row = StagingRow {
            word: "cat".into(),
            normalized_word: "cat".into(),
            part_of_speech: None,
            definition: "a small feline".into(),
            etymology: None,
            sense_number: None,
            raw_fragment: None,
            source_code: "WEB".into(),
            created_utc: 0,
            word_hash: "wh".into(),
            definition_hash: "dh".into(),
        };
        assert_eq!(row.dedup_key(), ("web".to_string(), -1, "wh".to_string(), "dh".to_string()));
    }

    #[test]
    fn field_type_strings_match_spec_enumeration() {
        assert_eq!(ChildFieldType::Alias.as_str(), "Alias");
        assert_eq!(ChildFieldType::CrossReference.as_str(), "CrossReference");
    }
}
