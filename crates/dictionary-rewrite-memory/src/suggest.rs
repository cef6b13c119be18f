//! Suggestion engine (Component H).
//!
//! `get_suggestions` never raises: a blank input, a missing index directory,
//! or a reader-open failure all resolve to an empty result, matching every
//! other read path's "log and absorb" contract.

use crate::index::{open_or_create, FieldHandles};
use dictionary_core::sentinels::truncate_chars;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{Term, TantivyDocument};

const PREVIEW_CHARS: usize = 120;
pub const SOURCE_TAG: &str = "lucene-memory";

/// One matched rewrite suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub mode: String,
    pub suggestion_text: String,
    pub score: f32,
    pub matched_hash: String,
    pub matched_original_preview: String,
    pub source: &'static str,
}

/// Escape Tantivy query-parser syntax characters in free-form user input.
#[must_use]
pub fn escape_query_syntax(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(
            c,
            '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~' | '*' | '?' | ':' | '\\' | '/'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Fetch up to `max_suggestions` rewrite suggestions for `input_text` under
/// `(source_code, mode)`, scored by the underlying Tantivy index at `index_dir`.
#[must_use]
pub fn get_suggestions(
    index_dir: &Path,
    source_code: &str,
    mode: &str,
    input_text: &str,
    max_suggestions: usize,
    min_score: f32,
) -> Vec<Suggestion> {
    if input_text.trim().is_empty() || !index_dir.join("meta.json").exists() {
        return Vec::new();
    }

    match try_get_suggestions(index_dir, source_code, mode, input_text, max_suggestions, min_score) {
        Ok(suggestions) => suggestions,
        Err(e) => {
            tracing::warn!(error = %e, source_code, mode, "suggestion lookup failed");
            Vec::new()
        }
    }
}

fn try_get_suggestions(
    index_dir: &Path,
    source_code: &str,
    mode: &str,
    input_text: &str,
    max_suggestions: usize,
    min_score: f32,
) -> crate::error::RewriteMemoryResult<Vec<Suggestion>> {
    let (index, handles) = open_or_create(index_dir)?;
    let reader = index.reader()?;
    let searcher = reader.searcher();

    let query = build_query(&index, &handles, source_code, mode, input_text)?;
    let fetch_n = 50usize.max(max_suggestions.saturating_mul(10));
    let top_docs = searcher.search(&query, &TopDocs::with_limit(fetch_n))?;

    let mut hits: Vec<(f32, u64, TantivyDocument)> = Vec::with_capacity(top_docs.len());
    for (score, address) in top_docs {
        let doc: TantivyDocument = searcher.doc(address)?;
        let seq = doc
            .get_first(handles.seq)
            .and_then(|v| v.as_u64())
            .unwrap_or(u64::MAX);
        hits.push((score, seq, doc));
    }
    // (score desc, docId asc) — deterministic on ties.
    hits.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));

    let mut suggestions = Vec::with_capacity(max_suggestions);
    for (score, _, doc) in hits {
        if suggestions.len() >= max_suggestions {
            break;
        }
        if score < min_score {
            continue;
        }
        let enhanced = field_string(&doc, handles.enhanced_text);
        if enhanced.is_empty() {
            continue;
        }
        let original = field_string(&doc, handles.original_text);
        let hash = field_string(&doc, handles.original_text_hash);
        suggestions.push(Suggestion {
            mode: mode.to_string(),
            suggestion_text: enhanced,
            score,
            matched_hash: hash,
            matched_original_preview: truncate_chars(&original, PREVIEW_CHARS),
            source: SOURCE_TAG,
        });
    }

    Ok(suggestions)
}

fn field_string(doc: &TantivyDocument, field: tantivy::schema::Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn build_query(
    index: &tantivy::Index,
    handles: &FieldHandles,
    source_code: &str,
    mode: &str,
    input_text: &str,
) -> crate::error::RewriteMemoryResult<BooleanQuery> {
    let source_term = Term::from_field_text(handles.source_code, source_code);
    let mode_term = Term::from_field_text(handles.mode, mode);

    let mut parser = QueryParser::for_index(index, vec![handles.original_text]);
    parser.set_conjunction_by_default();
    let escaped = escape_query_syntax(input_text.trim());
    let text_query = parser.parse_query(&escaped)?;

    let clauses: Vec<(Occur, Box<dyn Query>)> = vec![
        (
            Occur::Must,
            Box::new(TermQuery::new(source_term, IndexRecordOption::Basic)),
        ),
        (
            Occur::Must,
            Box::new(TermQuery::new(mode_term, IndexRecordOption::Basic)),
        ),
        (Occur::Must, text_query),
    ];
    Ok(BooleanQuery::new(clauses))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let suggestions = get_suggestions(dir.path(), "WEB", "English", "   ", 3, 1.2);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn missing_index_directory_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let suggestions = get_suggestions(&missing, "WEB", "English", "cat", 3, 1.2);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn escape_query_syntax_escapes_reserved_characters() {
        let escaped = escape_query_syntax("a+b-c:d");
        assert_eq!(escaped, "a\\+b\\-c\\:d");
    }

    #[test]
    fn escape_query_syntax_leaves_plain_words_alone() {
        assert_eq!(escape_query_syntax("hello world"), "hello world");
    }
}
