//! Structured logging bootstrap.
//!
//! Installs a `tracing-subscriber` `EnvFilter` + compact format layer once
//! per process. Every ambient log line in the pipeline goes through
//! `tracing::{debug,warn,error}!`, never `println!`.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber. Safe to call more than once;
/// only the first call has an effect.
pub fn init(default_level: &str) {
    INIT.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
