//! Connection pool configuration and initialization.
//!
//! Wraps `sqlmodel_pool` over the `sqlmodel_sqlite` backend. Connection
//! strings are immutable once the pool is built — the only process-wide
//! mutable configuration in this core is the title-case preservation rules
//! (`dictionary_text::titlecase`).

use crate::error::{DbError, DbResult};
use dictionary_core::config::DatabaseConfig;
use sqlmodel_pool::{Pool, PoolConfig};
use sqlmodel_sqlite::SqliteBackend;
use std::sync::Arc;
use std::time::Duration;

/// A pooled connection handle used throughout this crate.
pub type DbPool = Pool<SqliteBackend>;

/// Build a connection pool from the ambient database configuration.
///
/// # Errors
///
/// Returns [`DbError::Pool`] if the backend cannot be opened at `database_url`.
pub fn build_pool(config: &DatabaseConfig) -> DbResult<Arc<DbPool>> {
    let pool_config = PoolConfig {
        min_connections: 1,
        max_connections: config.pool_size + config.max_overflow,
        acquire_timeout: Duration::from_millis(config.acquire_timeout_ms),
        ..PoolConfig::default()
    };

    let backend = SqliteBackend::open(&config.database_url)
        .map_err(|e| DbError::Pool(format!("failed to open {}: {e}", config.database_url)))?;

    let pool = Pool::with_config(backend, pool_config)
        .map_err(|e| DbError::Pool(e.to_string()))?;

    Ok(Arc::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_produces_in_memory_url() {
        let config = DatabaseConfig::default();
        assert!(config.database_url.contains("sqlite"));
    }
}
