//! Pipeline configuration, loaded from environment variables.
//!
//! Mirrors the enumerated configuration surface in the specification's
//! external-interfaces section. Dynamic string-keyed option lookup is never
//! required at runtime — every field is a concrete, typed struct member.

use std::env;
use std::path::PathBuf;

/// Read an environment variable, falling back to `default` when unset or
/// empty. Centralizes the "env override with default" idiom used by every
/// field below.
fn env_value(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Default directory for the rewrite-memory Tantivy index.
pub const DEFAULT_INDEX_PATH: &str = "indexes/lucene/dictionary-rewrite-memory";

/// Per-run configuration for the rewrite-memory subsystem (components
/// G through K).
#[derive(Debug, Clone)]
pub struct RewriteMemoryConfig {
    pub index_path: PathBuf,
    pub max_suggestions: usize,
    pub min_score: f32,
    pub take: usize,
    pub write_candidates_to_sql: bool,
    pub candidate_min_confidence: f64,
    pub max_candidates_per_run: usize,
}

impl RewriteMemoryConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            index_path: PathBuf::from(env_value("DICT_INDEX_PATH", DEFAULT_INDEX_PATH)),
            max_suggestions: env_parsed("DICT_MAX_SUGGESTIONS", 3).min(10).max(1),
            min_score: env_parsed("DICT_MIN_SCORE", 1.2_f32),
            take: env_parsed::<usize>("DICT_TAKE", 500).clamp(1, 5000),
            write_candidates_to_sql: env_bool("DICT_WRITE_CANDIDATES_TO_SQL", true),
            candidate_min_confidence: env_parsed("DICT_CANDIDATE_MIN_CONFIDENCE", 0.75_f64)
                .min(1.0),
            max_candidates_per_run: env_parsed::<usize>("DICT_MAX_CANDIDATES_PER_RUN", 300)
                .clamp(1, 5000),
        }
    }
}

impl Default for RewriteMemoryConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            max_suggestions: 3,
            min_score: 1.2,
            take: 500,
            write_candidates_to_sql: true,
            candidate_min_confidence: 0.75,
            max_candidates_per_run: 300,
        }
    }
}

/// Ambient database connection settings, carried regardless of any
/// feature-level Non-goal.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub pool_size: usize,
    pub max_overflow: usize,
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            database_url: env_value("DICT_DATABASE_URL", "sqlite://dictionary.sqlite3"),
            pool_size: env_parsed("DICT_DATABASE_POOL_SIZE", 16),
            max_overflow: env_parsed("DICT_DATABASE_MAX_OVERFLOW", 16),
            acquire_timeout_ms: env_parsed("DICT_DATABASE_POOL_TIMEOUT_MS", 30_000),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://dictionary.sqlite3".to_string(),
            pool_size: 16,
            max_overflow: 16,
            acquire_timeout_ms: 30_000,
        }
    }
}

/// Full per-run pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub source_code: String,
    pub database: DatabaseConfig,
    pub rewrite_memory: RewriteMemoryConfig,
    pub log_level: String,
}

impl PipelineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            source_code: env_value("DICT_SOURCE_CODE", "UNKNOWN"),
            database: DatabaseConfig::from_env(),
            rewrite_memory: RewriteMemoryConfig::from_env(),
            log_level: env_value("DICT_LOG_LEVEL", "info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_enumeration() {
        let cfg = RewriteMemoryConfig::default();
        assert_eq!(cfg.max_suggestions, 3);
        assert!((cfg.min_score - 1.2).abs() < f32::EPSILON);
        assert_eq!(cfg.take, 500);
        assert!((cfg.candidate_min_confidence - 0.75).abs() < f64::EPSILON);
        assert_eq!(cfg.max_candidates_per_run, 300);
        assert_eq!(cfg.index_path, PathBuf::from(DEFAULT_INDEX_PATH));
    }
}
