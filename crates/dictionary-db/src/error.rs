//! Error types for the database layer.

use thiserror::Error;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    /// Error from the underlying SQL driver.
    #[error("SQL error: {0}")]
    Sql(String),

    /// Connection pool error.
    #[error("Pool error: {0}")]
    Pool(String),

    /// Connection pool exhausted (all connections in use, timeout expired).
    #[error("Database connection pool exhausted: {message}")]
    PoolExhausted {
        message: String,
        pool_size: usize,
        max_overflow: usize,
    },

    /// Transient lock/deadlock condition. Carries the engine-specific code
    /// the core treats as a signal (1205 deadlock, 56002/56020 lock-busy).
    #[error("Resource temporarily busy ({code}): {message}")]
    ResourceBusy { code: u32, message: String },

    /// Batch parameter budget exceeded (engine code 8003).
    #[error("Parameter overflow: {0}")]
    ParameterOverflow(String),

    /// Unique-key violation (engine codes 2627/2601).
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Column-size truncation (engine code 8152).
    #[error("Value truncated: {0}")]
    Truncation(String),

    /// Circuit breaker is open — database experiencing sustained failures.
    #[error("Circuit breaker open: {message}")]
    CircuitBreakerOpen {
        message: String,
        failures: u32,
        reset_after_secs: f64,
    },

    /// Record not found.
    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: &'static str,
        identifier: String,
    },

    /// Invalid argument.
    #[error("Invalid {field}: {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },

    /// Advisory-lock finalize failed after exhausting all retries. The only
    /// variant permitted to escape a writer's public entry point.
    #[error("finalize failed for {source_code} after {attempts} attempts: {message}")]
    FinalizeFailed {
        source_code: String,
        attempts: u32,
        message: String,
    },

    /// Schema/migration error.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for database operations.
pub type DbResult<T> = std::result::Result<T, DbError>;

impl DbError {
    #[must_use]
    pub fn not_found(entity: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            identifier: identifier.into(),
        }
    }

    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            message: message.into(),
        }
    }

    /// Whether this error is a transient, retryable condition: deadlock,
    /// lock-busy, pool exhaustion, or a generic resource-busy driver error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Sql(msg) | Self::Pool(msg) => is_lock_error(msg),
            Self::ResourceBusy { .. } | Self::PoolExhausted { .. } => true,
            _ => false,
        }
    }

    /// Engine-specific numeric code this error corresponds to, when the
    /// error class carries one (deadlock 1205, lock-busy 56002/56020,
    /// parameter overflow 8003, unique violation 2627/2601, truncation 8152).
    #[must_use]
    pub fn error_code(&self) -> Option<u32> {
        match self {
            Self::ResourceBusy { code, .. } => Some(*code),
            Self::ParameterOverflow(_) => Some(8003),
            Self::UniqueViolation(_) => Some(2627),
            Self::Truncation(_) => Some(8152),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Self::ResourceBusy { code: 1205, .. })
    }

    #[must_use]
    pub fn is_lock_busy(&self) -> bool {
        matches!(self, Self::ResourceBusy { code: 56002 | 56020, .. })
    }
}

/// Check whether an error message indicates a database lock/busy condition.
#[must_use]
pub fn is_lock_error(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("database is locked")
        || lower.contains("database is busy")
        || lower.contains("locked")
        || lower.contains("deadlock")
        || lower.contains("unable to open database")
        || lower.contains("disk i/o error")
}

/// Check whether an error message indicates pool exhaustion.
#[must_use]
pub fn is_pool_exhausted_error(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    (lower.contains("pool") && (lower.contains("timeout") || lower.contains("exhausted")))
        || lower.contains("queuepool")
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlock_is_retryable_and_coded() {
        let err = DbError::ResourceBusy {
            code: 1205,
            message: "deadlock victim".into(),
        };
        assert!(err.is_retryable());
        assert!(err.is_deadlock());
        assert_eq!(err.error_code(), Some(1205));
    }

    #[test]
    fn lock_busy_is_retryable() {
        let err = DbError::ResourceBusy {
            code: 56002,
            message: "advisory lock busy".into(),
        };
        assert!(err.is_retryable());
        assert!(err.is_lock_busy());
    }

    #[test]
    fn not_found_is_not_retryable() {
        assert!(!DbError::not_found("entry", "x").is_retryable());
    }

    #[test]
    fn lock_error_detection() {
        assert!(is_lock_error("database is locked"));
        assert!(is_lock_error("Deadlock detected"));
        assert!(!is_lock_error("syntax error in SQL"));
    }
}
