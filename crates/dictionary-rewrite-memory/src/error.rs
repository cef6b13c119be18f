//! Error type for the rewrite-memory subsystem.
//!
//! Every public entry point in this crate absorbs its own failures per the
//! "never raises; cancellation returns empty" contract — this type exists so
//! the absorbing code has something concrete to log, not so callers have
//! something to propagate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewriteMemoryError {
    #[error("tantivy error: {0}")]
    Index(String),

    #[error("index state file error: {0}")]
    State(String),

    #[error("database error: {0}")]
    Db(#[from] dictionary_db::DbError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RewriteMemoryResult<T> = std::result::Result<T, RewriteMemoryError>;

impl From<tantivy::TantivyError> for RewriteMemoryError {
    fn from(e: tantivy::TantivyError) -> Self {
        Self::Index(e.to_string())
    }
}

impl From<tantivy::query::QueryParserError> for RewriteMemoryError {
    fn from(e: tantivy::query::QueryParserError) -> Self {
        Self::Index(e.to_string())
    }
}
