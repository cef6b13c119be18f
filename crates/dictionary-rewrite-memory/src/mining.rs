//! Candidate mining step (Component I).
//!
//! Runs the suggestion engine (H) against each source's own recent
//! annotations to surface repeated AI rewrites as `RewriteMapCandidate`
//! rows, gated by [`candidate_gate`] so only plausible, well-formed pairs
//! ever reach the table the promotion service (J) reads from.

use crate::error::RewriteMemoryResult;
use crate::index::{AnnotationRow, IndexBuilder, IndexMode};
use crate::suggest::get_suggestions;
use dictionary_db::{DbError, DbPool};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Maps the index-time and legacy rule modes onto the style mode used for
/// `RewriteRule` dedup lookups (§4.I step 8, §4.J). `Definition`,
/// `MeaningTitle`, `Title`, and `Example` are all legacy aliases for
/// `English`; anything else is assumed to already be a normalized style code.
#[must_use]
pub fn normalize_legacy_mode(mode: &str) -> String {
    match mode {
        "Definition" | "MeaningTitle" | "Title" | "Example" => "English".to_string(),
        other => other.to_string(),
    }
}

/// Map a suggestion score to its confidence bucket (§4.I step 6).
#[must_use]
pub fn score_to_confidence(score: f32) -> f64 {
    if score >= 2.0 {
        0.90
    } else if score >= 1.6 {
        0.80
    } else if score >= 1.2 {
        0.70
    } else {
        0.60
    }
}

const FORBIDDEN_PLACEHOLDERS: &[&str] = &["[NON_ENGLISH]", "[BILINGUAL_EXAMPLE]"];

fn mode_length_cap(mode: &str) -> usize {
    match mode {
        "MeaningTitle" | "Title" => 80,
        "Example" => 200,
        _ => 300,
    }
}

/// Validate a mined `(fromText, toText)` pair per §4.I step 5 / §8's
/// candidate-gate-totality property.
#[must_use]
pub fn candidate_gate(mode: &str, from_text: &str, to_text: &str) -> bool {
    let from = from_text.trim();
    let to = to_text.trim();

    if from.len() <= 3 || to.len() <= 3 || from == to {
        return false;
    }
    if from.contains('\n') || from.contains('\t') || to.contains('\n') || to.contains('\t') {
        return false;
    }
    let cap = mode_length_cap(mode);
    if from.chars().count() > cap || to.chars().count() > cap {
        return false;
    }
    if digit_ratio(from) >= 0.20 || digit_ratio(to) >= 0.20 {
        return false;
    }
    if symbol_ratio(from) >= 0.35 || symbol_ratio(to) >= 0.35 {
        return false;
    }
    if from.ends_with(':') || to.ends_with(':') {
        return false;
    }
    if FORBIDDEN_PLACEHOLDERS.iter().any(|p| from == *p || to == *p) {
        return false;
    }
    true
}

fn digit_ratio(text: &str) -> f64 {
    ratio(text, char::is_numeric)
}

fn symbol_ratio(text: &str) -> f64 {
    ratio(text, |c: char| !c.is_alphanumeric() && !c.is_whitespace())
}

fn ratio(text: &str, pred: impl Fn(char) -> bool) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let matched = text.chars().filter(|&c| pred(c)).count();
    #[allow(clippy::cast_precision_loss)]
    let r = matched as f64 / total as f64;
    r
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RuleKeyRow {
    mode_code: Option<String>,
    from_text: String,
}

/// One gated-and-bucketed mining result, ready for upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct MinedCandidate {
    pub mode: String,
    pub from_text: String,
    pub to_text: String,
    pub confidence: f64,
}

/// Candidate miner for one source.
pub struct CandidateMiner {
    index_dir: PathBuf,
    pool: Arc<DbPool>,
}

impl CandidateMiner {
    #[must_use]
    pub fn new(index_dir: PathBuf, pool: Arc<DbPool>) -> Self {
        Self { index_dir, pool }
    }

    /// Run one mining pass: ensure the index exists, mine gated candidates
    /// from recent annotations, filter against existing rules, and upsert
    /// survivors. Returns the number of candidates upserted. Never raises.
    pub fn run(&self, source_code: &str, take: usize, candidate_min_confidence: f64, max_candidates_per_run: usize) -> usize {
        match self.try_run(source_code, take, candidate_min_confidence, max_candidates_per_run) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, source_code, "candidate mining run failed");
                0
            }
        }
    }

    fn try_run(
        &self,
        source_code: &str,
        take: usize,
        candidate_min_confidence: f64,
        max_candidates_per_run: usize,
    ) -> RewriteMemoryResult<usize> {
        let take = take.clamp(1, 5000);
        let max_candidates_per_run = max_candidates_per_run.min(5000);

        if !self.index_dir.join("meta.json").exists() {
            IndexBuilder::new(self.index_dir.clone(), Arc::clone(&self.pool)).build_incremental(source_code, take);
        }

        let rows = self.fetch_recent_annotations(source_code, take)?;
        let mut mined = self.mine_pairs(source_code, &rows, candidate_min_confidence);

        mined.truncate(max_candidates_per_run);
        if mined.len() > max_candidates_per_run {
            tracing::warn!(
                source_code,
                dropped = mined.len() - max_candidates_per_run,
                "mining run exceeded maxCandidatesPerRun, extra candidates dropped"
            );
        }

        let existing = self.existing_rule_keys(source_code)?;
        mined.retain(|c| !existing.contains(&(normalize_legacy_mode(&c.mode), c.from_text.clone())));

        let mut upserted = 0;
        for candidate in &mined {
            if self.upsert_candidate(source_code, candidate).is_ok() {
                upserted += 1;
            }
        }
        Ok(upserted)
    }

    fn mine_pairs(&self, source_code: &str, rows: &[AnnotationRow], candidate_min_confidence: f64) -> Vec<MinedCandidate> {
        let mut out = Vec::new();
        for row in rows {
            for (mode, input_text) in [
                (IndexMode::Definition, row.original_definition.as_str()),
                (
                    IndexMode::MeaningTitle,
                    row.meaning_title.as_deref().unwrap_or_default(),
                ),
            ] {
                if input_text.trim().is_empty() {
                    continue;
                }
                let suggestions = get_suggestions(&self.index_dir, source_code, mode.as_str(), input_text, 1, 1.2);
                for suggestion in suggestions {
                    if !candidate_gate(mode.as_str(), input_text, &suggestion.suggestion_text) {
                        continue;
                    }
                    let confidence = score_to_confidence(suggestion.score);
                    if confidence < candidate_min_confidence {
                        continue;
                    }
                    out.push(MinedCandidate {
                        mode: mode.as_str().to_string(),
                        from_text: input_text.trim().to_string(),
                        to_text: suggestion.suggestion_text,
                        confidence,
                    });
                }
            }

            for example in examples_from_notes(&row.ai_notes_json).into_iter().take(10) {
                let suggestions = get_suggestions(&self.index_dir, source_code, IndexMode::Example.as_str(), &example, 1, 1.2);
                for suggestion in suggestions {
                    if !candidate_gate("Example", &example, &suggestion.suggestion_text) {
                        continue;
                    }
                    let confidence = score_to_confidence(suggestion.score);
                    if confidence < candidate_min_confidence {
                        continue;
                    }
                    out.push(MinedCandidate {
                        mode: "Example".to_string(),
                        from_text: example.trim().to_string(),
                        to_text: suggestion.suggestion_text,
                        confidence,
                    });
                }
            }
        }
        out
    }

    fn existing_rule_keys(&self, source_code: &str) -> RewriteMemoryResult<HashSet<(String, String)>> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        let rows: Vec<RuleKeyRow> = conn
            .query_many(
                "SELECT mode_code, from_text FROM rewrite_rule WHERE mode_code IS NULL OR mode_code = ?",
                &[source_code.into()],
            )
            .map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|row| (row.mode_code.unwrap_or_else(|| "English".to_string()), row.from_text))
            .collect())
    }

    fn upsert_candidate(&self, source_code: &str, candidate: &MinedCandidate) -> RewriteMemoryResult<()> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        let now = dictionary_core::timestamps::now_micros();
        conn.execute(
            "INSERT INTO rewrite_map_candidate
                (source_code, mode, from_text, to_text, suggested_count, avg_confidence_score,
                 first_seen_utc, last_seen_utc, status)
             VALUES (?, ?, ?, ?, 1, ?, ?, ?, 'Pending')
             ON CONFLICT (source_code, mode, from_text, to_text) DO UPDATE SET
                suggested_count = suggested_count + 1,
                avg_confidence_score = (avg_confidence_score * suggested_count + excluded.avg_confidence_score)
                                       / (suggested_count + 1),
                last_seen_utc = excluded.last_seen_utc",
            &[
                source_code.into(),
                candidate.mode.as_str().into(),
                candidate.from_text.as_str().into(),
                candidate.to_text.as_str().into(),
                candidate.confidence.into(),
                now.into(),
                now.into(),
            ],
        )
        .map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(())
    }

    fn fetch_recent_annotations(&self, source_code: &str, take: usize) -> RewriteMemoryResult<Vec<AnnotationRow>> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        let rows = conn
            .query_many(
                "SELECT a.parsed_definition_id, a.source_code, a.original_definition, \
                        a.ai_enhanced_definition, p.meaning_title, a.ai_notes_json \
                 FROM dictionary_entry_ai_annotation a \
                 JOIN dictionary_entry_parsed p ON p.id = a.parsed_definition_id \
                 WHERE a.source_code = ? \
                 ORDER BY a.parsed_definition_id DESC LIMIT ?",
                &[source_code.into(), (take as i64).into()],
            )
            .map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(rows)
    }
}

fn examples_from_notes(ai_notes_json: &str) -> Vec<String> {
    serde_json::from_str::<dictionary_db::models::AiNotes>(ai_notes_json)
        .map(|notes| notes.examples.into_iter().map(|e| e.original).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_buckets_match_spec_thresholds() {
        assert!((score_to_confidence(2.5) - 0.90).abs() < f64::EPSILON);
        assert!((score_to_confidence(1.8) - 0.80).abs() < f64::EPSILON);
        assert!((score_to_confidence(1.3) - 0.70).abs() < f64::EPSILON);
        assert!((score_to_confidence(0.5) - 0.60).abs() < f64::EPSILON);
    }

    #[test]
    fn legacy_modes_normalize_to_english() {
        assert_eq!(normalize_legacy_mode("Definition"), "English");
        assert_eq!(normalize_legacy_mode("MeaningTitle"), "English");
        assert_eq!(normalize_legacy_mode("Title"), "English");
        assert_eq!(normalize_legacy_mode("Example"), "English");
        assert_eq!(normalize_legacy_mode("Formal"), "Formal");
    }

    #[test]
    fn gate_rejects_short_or_identical_pairs() {
        assert!(!candidate_gate("English", "cat", "cats"));
        assert!(!candidate_gate("English", "a definition", "a definition"));
    }

    #[test]
    fn gate_rejects_numeric_and_symbol_heavy_text() {
        assert!(!candidate_gate("English", "1234567890", "a real definition"));
        assert!(!candidate_gate("English", "!!!@@@###$$$", "a real definition"));
    }

    #[test]
    fn gate_rejects_trailing_colon_and_placeholders() {
        assert!(!candidate_gate("English", "see also:", "a real definition"));
        assert!(!candidate_gate("English", "[NON_ENGLISH]", "a real definition"));
    }

    #[test]
    fn gate_accepts_well_formed_pair() {
        assert!(candidate_gate("English", "a small feline animal", "a small domesticated cat"));
    }

    #[test]
    fn gate_enforces_mode_specific_length_caps() {
        let long_title = "x".repeat(90);
        assert!(!candidate_gate("Title", &long_title, "short title"));
        assert!(candidate_gate("Title", "short from title", "short to title"));
    }

    proptest::proptest! {
        /// Totality: the gate is a plain predicate over arbitrary unicode
        /// strings and never panics, regardless of mode or text shape.
        #[test]
        fn gate_is_total_over_arbitrary_text(from in ".{0,400}", to in ".{0,400}", mode in "[A-Za-z]{0,20}") {
            let _ = candidate_gate(&mode, &from, &to);
        }
    }
}
