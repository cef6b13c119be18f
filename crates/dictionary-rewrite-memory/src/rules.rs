//! Rule application (Component K).
//!
//! Loads enabled rules for a query mode, applies them sequentially to
//! protected-token-masked text, and accumulates a per-run hit buffer that is
//! flushed to the hit log once at the end of the run.

use crate::error::RewriteMemoryResult;
use dictionary_db::{BatchRow, Batcher, DbError, DbPool};
use dictionary_text::{protect, restore};
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;

/// One loaded `RewriteRule` row, ready to apply.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RewriteRule {
    pub id: i64,
    pub mode_code: Option<String>,
    pub from_text: String,
    pub to_text: String,
    pub is_whole_word: bool,
    pub is_regex: bool,
    pub priority: i64,
}

/// Sort rules by `(priority asc, length(fromText) desc, fromText asc, id asc)`
/// — longer, more specific rules first, deterministic on ties (§4.K).
pub fn sort_rules(rules: &mut [RewriteRule]) {
    rules.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.from_text.chars().count().cmp(&a.from_text.chars().count()))
            .then_with(|| a.from_text.cmp(&b.from_text))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Apply one rule to `text`, whole-word matching `fromText` if
/// `is_whole_word`, else treating it as a regex. Returns the rewritten text
/// and whether a replacement occurred.
fn apply_one(text: &str, rule: &RewriteRule) -> (String, bool) {
    if rule.is_whole_word {
        let Ok(pattern) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&rule.from_text))) else {
            return (text.to_string(), false);
        };
        if pattern.is_match(text) {
            (pattern.replace_all(text, rule.to_text.as_str()).into_owned(), true)
        } else {
            (text.to_string(), false)
        }
    } else {
        let Ok(pattern) = Regex::new(&rule.from_text) else {
            return (text.to_string(), false);
        };
        if pattern.is_match(text) {
            (pattern.replace_all(text, rule.to_text.as_str()).into_owned(), true)
        } else {
            (text.to_string(), false)
        }
    }
}

struct HitLogRow {
    source_code: String,
    mode: String,
    rule_type: String,
    rule_key: String,
    hit_count: i64,
    now: i64,
}

impl BatchRow for HitLogRow {
    fn operation_key(&self) -> &str {
        "rewrite_rule_hit_log:upsert"
    }

    fn sql_template(&self) -> &str {
        "INSERT INTO rewrite_rule_hit_log \
            (source_code, mode, rule_type, rule_key, hit_count, first_hit_utc, last_hit_utc) \
         VALUES (@SourceCode, @Mode, @RuleType, @RuleKey, @HitCount, @Now, @Now) \
         ON CONFLICT (source_code, mode, rule_type, rule_key) DO UPDATE SET \
            hit_count = hit_count + @HitCount, \
            last_hit_utc = @Now"
    }

    fn parameters(&self) -> Vec<JsonValue> {
        vec![
            json!(self.source_code),
            json!(self.mode),
            json!(self.rule_type),
            json!(self.rule_key),
            json!(self.hit_count),
            json!(self.now),
        ]
    }
}

/// Accumulates `(sourceCode, mode, ruleType, ruleKey) -> count` across one
/// run and flushes it to the hit log exactly once.
#[derive(Default)]
pub struct HitBuffer {
    counts: HashMap<(String, String, String, String), i64>,
}

impl HitBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, source_code: &str, mode: &str, rule_type: &str, rule_key: &str) {
        *self
            .counts
            .entry((source_code.to_string(), mode.to_string(), rule_type.to_string(), rule_key.to_string()))
            .or_insert(0) += 1;
    }

    /// Flush the accumulated hit counts through `batcher`, one queued row
    /// per distinct key, then flush the shared operation key once.
    pub fn flush(self, batcher: &Batcher) -> RewriteMemoryResult<()> {
        if self.counts.is_empty() {
            return Ok(());
        }
        let now = dictionary_core::timestamps::now_micros();
        for ((source_code, mode, rule_type, rule_key), hit_count) in self.counts {
            let row = HitLogRow {
                source_code,
                mode,
                rule_type,
                rule_key,
                hit_count,
                now,
            };
            batcher.queue(&row).map_err(crate::error::RewriteMemoryError::Db)?;
        }
        batcher
            .flush("rewrite_rule_hit_log:upsert")
            .map_err(crate::error::RewriteMemoryError::Db)?;
        Ok(())
    }
}

/// Loads and applies `RewriteRule` rows for one query mode.
pub struct RuleEngine {
    pool: Arc<DbPool>,
}

impl RuleEngine {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Load enabled rules filtered by `(modeCode = queryMode OR modeCode IS NULL)`,
    /// sorted per [`sort_rules`].
    ///
    /// # Errors
    /// Returns an error if the rule fetch fails.
    pub fn load_rules(&self, query_mode: &str) -> RewriteMemoryResult<Vec<RewriteRule>> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        let mut rules: Vec<RewriteRule> = conn
            .query_many(
                "SELECT id, mode_code, from_text, to_text, is_whole_word, is_regex, priority \
                 FROM rewrite_rule WHERE enabled = 1 AND (mode_code = ? OR mode_code IS NULL)",
                &[query_mode.into()],
            )
            .map_err(|e| DbError::Sql(e.to_string()))?;
        sort_rules(&mut rules);
        Ok(rules)
    }

    /// Apply every loaded rule sequentially to protected-token-masked
    /// `text`, recording a hit per rule that actually changed the text.
    pub fn apply(&self, source_code: &str, query_mode: &str, text: &str, rules: &[RewriteRule], hits: &mut HitBuffer) -> String {
        let protected = protect(text);
        let mut working = protected.text;
        for rule in rules {
            let (next, changed) = apply_one(&working, rule);
            if changed {
                let rule_type = if rule.is_regex { "Regex" } else { "WholeWord" };
                hits.record(source_code, query_mode, rule_type, &rule.from_text);
            }
            working = next;
        }
        restore(&working, &protected.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: i64, mode_code: Option<&str>, from_text: &str, priority: i64) -> RewriteRule {
        RewriteRule {
            id,
            mode_code: mode_code.map(str::to_string),
            from_text: from_text.to_string(),
            to_text: format!("{from_text}_rewritten"),
            is_whole_word: true,
            is_regex: false,
            priority,
        }
    }

    #[test]
    fn sort_orders_by_priority_then_length_then_text_then_id() {
        let mut rules = vec![
            rule(3, None, "cat", 10),
            rule(1, None, "caterpillar", 10),
            rule(2, None, "dog", 5),
        ];
        sort_rules(&mut rules);
        let ids: Vec<i64> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn sort_breaks_equal_length_ties_by_text_then_id() {
        let mut rules = vec![rule(5, None, "bbb", 1), rule(4, None, "aaa", 1)];
        sort_rules(&mut rules);
        assert_eq!(rules[0].from_text, "aaa");
    }

    #[test]
    fn apply_one_replaces_whole_word_case_insensitively() {
        let rule = rule(1, None, "cat", 10);
        let (text, changed) = apply_one("I have a Cat", &rule);
        assert!(changed);
        assert_eq!(text, "I have a cat_rewritten");
    }

    #[test]
    fn apply_one_does_not_match_substring_of_a_longer_word() {
        let rule = rule(1, None, "cat", 10);
        let (text, changed) = apply_one("concatenate", &rule);
        assert!(!changed);
        assert_eq!(text, "concatenate");
    }

    #[test]
    fn hit_buffer_accumulates_counts_per_key() {
        let mut hits = HitBuffer::new();
        hits.record("WEB", "English", "WholeWord", "cat");
        hits.record("WEB", "English", "WholeWord", "cat");
        assert_eq!(
            hits.counts
                .get(&("WEB".to_string(), "English".to_string(), "WholeWord".to_string(), "cat".to_string())),
            Some(&2)
        );
    }
}
