//! Relational persistence layer for the dictionary import pipeline.
//!
//! Owns the staging loader, the generic batcher, the non-English side-store,
//! and the parsed-definition/child-row writers. Nothing above this crate
//! talks to the database directly.

#![forbid(unsafe_code)]

pub mod batcher;
pub mod error;
pub mod models;
pub mod nonenglish;
pub mod pool;
pub mod proptest_generators;
pub mod retry;
pub mod schema;
pub mod staging;
pub mod writers;

pub use batcher::{BatchRow, Batcher};
pub use error::{DbError, DbResult};
pub use nonenglish::{FieldType, NonEnglishStore};
pub use pool::{build_pool, DbPool};
pub use retry::{BatcherRetryPolicy, CircuitBreaker, FinalizeRetryPolicy};
pub use staging::{LoadReport, StagingLoader};
pub use writers::{ChildKind, ChildWriter, ParsedDefinitionWriter};
