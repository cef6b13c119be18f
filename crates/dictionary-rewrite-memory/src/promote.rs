//! Promotion service (Component J).
//!
//! Lifts `Approved` candidates into `RewriteRule` rows with a derived
//! priority. Per the fatal-vs-absorbed policy (§7), promotion is the one
//! write path that is *not* retried on transient failure — the caller
//! reinvokes.

use crate::error::RewriteMemoryResult;
use crate::mining::normalize_legacy_mode;
use chrono::Utc;
use dictionary_db::{DbError, DbPool};
use std::sync::Arc;

const MAX_TEXT_LEN: usize = 400;
const MAX_NOTES_LEN: usize = 200;
const BASE_PRIORITY: i64 = 500;
const MIN_PRIORITY: i64 = 50;
const MAX_PRIORITY: i64 = 1000;

const STYLE_CODES: &[&str] = &[
    "Academic",
    "Casual",
    "Educational",
    "Email",
    "English",
    "Formal",
    "GrammarFix",
    "Legal",
    "Medical",
    "Neutral",
    "Professional",
    "Simplify",
    "Technical",
];

/// Normalize a candidate's mode to the closed style-code set, falling back
/// to `English` for anything not already recognized (legacy aliases are
/// handled by [`normalize_legacy_mode`] first).
#[must_use]
pub fn normalize_style_mode(mode: &str) -> String {
    let legacy_mapped = normalize_legacy_mode(mode);
    if STYLE_CODES.contains(&legacy_mapped.as_str()) {
        legacy_mapped
    } else {
        "English".to_string()
    }
}

/// Derive promotion priority from observation counts (§4.J, lower wins).
#[must_use]
pub fn compute_priority(suggested_count: i64, avg_confidence: f64) -> i64 {
    let mut priority = BASE_PRIORITY;
    priority -= match suggested_count {
        n if n >= 50 => 30,
        n if n >= 10 => 20,
        n if n >= 3 => 10,
        _ => 0,
    };
    priority -= if avg_confidence >= 0.90 {
        30
    } else if avg_confidence >= 0.75 {
        20
    } else if avg_confidence >= 0.60 {
        10
    } else {
        0
    };
    priority.clamp(MIN_PRIORITY, MAX_PRIORITY)
}

#[derive(Debug, Clone, serde::Deserialize)]
struct ApprovedCandidate {
    id: i64,
    mode: String,
    from_text: String,
    to_text: String,
    suggested_count: i64,
    avg_confidence_score: f64,
}

/// Outcome of one promotion run, logged as `Promoted={n}` per §7.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionReport {
    pub promoted: usize,
    pub skipped: usize,
}

pub struct PromotionService {
    pool: Arc<DbPool>,
}

impl PromotionService {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Promote up to `take` Approved candidates for `source_code`. Rolls
    /// back and rethrows on failure (not retried; see §7 class 1).
    ///
    /// # Errors
    /// Returns an error if the candidate fetch, rule upsert, or candidate
    /// mark-promoted step fails.
    pub fn promote(&self, source_code: &str, take: usize, promoted_by: &str) -> RewriteMemoryResult<PromotionReport> {
        let take = take.clamp(1, 5000);
        let candidates = self.fetch_approved(source_code, take)?;

        let mut report = PromotionReport::default();
        let mut promoted_ids = Vec::new();

        for candidate in &candidates {
            match self.promote_one(source_code, candidate, promoted_by) {
                Ok(true) => {
                    report.promoted += 1;
                    promoted_ids.push(candidate.id);
                }
                Ok(false) => report.skipped += 1,
                Err(e) => return Err(e),
            }
        }

        if !promoted_ids.is_empty() {
            self.mark_promoted(&promoted_ids, promoted_by)?;
        }
        Ok(report)
    }

    fn promote_one(&self, source_code: &str, candidate: &ApprovedCandidate, promoted_by: &str) -> RewriteMemoryResult<bool> {
        let from_text = truncate(candidate.from_text.trim(), MAX_TEXT_LEN);
        let to_text = truncate(candidate.to_text.trim(), MAX_TEXT_LEN);
        if from_text.is_empty() || to_text.is_empty() || from_text == to_text {
            return Ok(false);
        }

        let mode_code = normalize_style_mode(&candidate.mode);
        let priority = compute_priority(candidate.suggested_count, candidate.avg_confidence_score);
        let notes = truncate(
            &format!(
                "PROMOTED_BY={promoted_by};SRC={source_code};UTC={}",
                Utc::now().format("%Y-%m-%d")
            ),
            MAX_NOTES_LEN,
        );

        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        conn.execute(
            "INSERT INTO rewrite_rule
                (mode_code, from_text, to_text, is_whole_word, is_regex, priority, enabled, notes)
             VALUES (?, ?, ?, 1, 0, ?, 1, ?)
             ON CONFLICT (mode_code, from_text, is_whole_word, is_regex) DO UPDATE SET
                to_text = excluded.to_text,
                enabled = 1,
                priority = excluded.priority,
                notes = excluded.notes",
            &[
                mode_code.as_str().into(),
                from_text.as_str().into(),
                to_text.as_str().into(),
                priority.into(),
                notes.as_str().into(),
            ],
        )
        .map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(true)
    }

    fn fetch_approved(&self, source_code: &str, take: usize) -> RewriteMemoryResult<Vec<ApprovedCandidate>> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        let rows = conn
            .query_many(
                "SELECT id, mode, from_text, to_text, suggested_count, avg_confidence_score \
                 FROM rewrite_map_candidate \
                 WHERE source_code = ? AND status = 'Approved' \
                 ORDER BY id ASC LIMIT ?",
                &[source_code.into(), (take as i64).into()],
            )
            .map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(rows)
    }

    fn mark_promoted(&self, ids: &[i64], promoted_by: &str) -> RewriteMemoryResult<()> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        let now = dictionary_core::timestamps::now_micros();
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "UPDATE rewrite_map_candidate SET status = 'Promoted', approved_by = ?, approved_utc = ? \
             WHERE id IN ({placeholders})"
        );
        let mut params: Vec<sqlmodel_core::Value> = vec![promoted_by.into(), now.into()];
        params.extend(ids.iter().map(|&id| id.into()));
        conn.execute(&sql, &params).map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(())
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        text.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_lowest_for_high_count_high_confidence() {
        assert_eq!(compute_priority(60, 0.95), 500 - 30 - 30);
    }

    #[test]
    fn priority_defaults_to_base_for_low_observation() {
        assert_eq!(compute_priority(1, 0.50), 500);
    }

    #[test]
    fn priority_never_drops_below_floor() {
        assert!(compute_priority(10_000, 1.0) >= MIN_PRIORITY);
    }

    #[test]
    fn legacy_style_modes_map_to_english() {
        assert_eq!(normalize_style_mode("Definition"), "English");
        assert_eq!(normalize_style_mode("MeaningTitle"), "English");
    }

    #[test]
    fn known_style_codes_pass_through() {
        assert_eq!(normalize_style_mode("Formal"), "Formal");
        assert_eq!(normalize_style_mode("Technical"), "Technical");
    }

    #[test]
    fn unknown_style_codes_fall_back_to_english() {
        assert_eq!(normalize_style_mode("Whatever"), "English");
    }
}
