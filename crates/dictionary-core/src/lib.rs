//! Ambient stack for the dictionary import & rewrite-memory pipeline.
//!
//! This crate provides:
//! - Configuration loading from environment variables
//! - The crate-wide error type
//! - Structured logging bootstrap
//! - Timestamp conventions shared by every other crate
//! - Sentinel values and column-bound constants from the data model

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod sentinels;
pub mod timestamps;

pub use config::PipelineConfig;
pub use error::{Error, Result};
