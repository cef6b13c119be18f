//! Generic SQL operation batcher (Component D).
//!
//! Coalesces parameterized statements that share a `(operationKey,
//! sqlTemplate)` pair and flushes them as a single multi-statement batch.
//! Every writer in Component F funnels through the same flush/retry/recovery
//! path via the [`BatchRow`] trait — one implementation, many callers.

use crate::error::{DbError, DbResult};
use crate::pool::DbPool;
use crate::retry::{retry_batcher_deadlock, BatcherRetryPolicy};
use dictionary_core::timestamps::now_micros;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Hard engine limit on parameters per batch. The batcher enforces a safety
/// margin below it.
pub const ENGINE_PARAMETER_LIMIT: usize = 2100;
/// Safety cap the batcher never crosses.
pub const SAFE_PARAMETER_BUDGET: usize = 2000;
/// Default number of operations per flush before considering the parameter budget.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
/// Flush timer window.
pub const FLUSH_WINDOW: Duration = Duration::from_secs(2);

static PARAM_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Anything that can be queued through the batcher: a logical operation key,
/// a parameterized SQL template, and an ordered parameter record.
pub trait BatchRow: Send {
    fn operation_key(&self) -> &str;
    fn sql_template(&self) -> &str;
    /// Parameter values in the order the template's distinct `@Name` tokens
    /// were first extracted.
    fn parameters(&self) -> Vec<JsonValue>;
}

/// Compute `maxSafeBatchSize = max(1, min(defaultMax, (2000-100)/paramsPerOp))`.
#[must_use]
pub fn max_safe_batch_size(params_per_op: usize) -> usize {
    if params_per_op == 0 {
        return DEFAULT_MAX_BATCH_SIZE;
    }
    let budget_based = (SAFE_PARAMETER_BUDGET - 100) / params_per_op;
    DEFAULT_MAX_BATCH_SIZE.min(budget_based).max(1)
}

/// Distinct, ordered parameter names in `template`, excluding `@@` system
/// tokens (a leading `@` immediately followed by another `@`).
#[must_use]
pub fn extract_parameter_names(template: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();
    for m in PARAM_TOKEN.find_iter(template) {
        // `@@ROWCOUNT`-style system tokens: the match starts one char after
        // a second leading `@`, so back up one byte and check for it.
        if m.start() > 0 && template.as_bytes()[m.start() - 1] == b'@' {
            continue;
        }
        let name = &template[m.start() + 1..m.end()];
        if seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }
    names
}

/// Rewrite a template's parameter tokens to a batch-slot-scoped form:
/// `@Name` → `@p{slot}_Name`, only for names present in `names`.
#[must_use]
pub fn rewrite_template_for_slot(template: &str, names: &[String], slot: usize) -> String {
    let mut out = template.to_string();
    // Longer names first so "@Id" doesn't clobber inside "@IdName".
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort_by_key(|n| std::cmp::Reverse(n.len()));
    for name in sorted {
        let from = format!("@{name}");
        let to = format!("@p{slot}_{name}");
        out = out.replace(&from, &to);
    }
    out
}

struct PendingBatch {
    rows: Vec<(String, Vec<JsonValue>)>,
    template: String,
    started_at: Instant,
}

/// One operation-key's queue plus its flush single-flight guard.
struct OperationState {
    batch: Mutex<Option<PendingBatch>>,
    flush_gate: Mutex<()>,
    flush_cv: Condvar,
}

/// Coalesces batched operations per `(operationKey, sqlTemplate)` and
/// flushes them under the parameter-budget/size/timer rules above.
pub struct Batcher {
    pool: std::sync::Arc<DbPool>,
    operations: Mutex<HashMap<String, std::sync::Arc<OperationState>>>,
    retry_policy: BatcherRetryPolicy,
}

impl Batcher {
    #[must_use]
    pub fn new(pool: std::sync::Arc<DbPool>) -> Self {
        Self {
            pool,
            operations: Mutex::new(HashMap::new()),
            retry_policy: BatcherRetryPolicy::default(),
        }
    }

    fn operation_state(&self, key: &str) -> std::sync::Arc<OperationState> {
        let mut ops = self.operations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        ops.entry(key.to_string())
            .or_insert_with(|| {
                std::sync::Arc::new(OperationState {
                    batch: Mutex::new(None),
                    flush_gate: Mutex::new(()),
                    flush_cv: Condvar::new(),
                })
            })
            .clone()
    }

    /// Queue one row under `row.operation_key()`. Synchronously flushes the
    /// batch once it reaches the safe size for its template's parameter
    /// count; otherwise the row waits for the flush timer (driven by
    /// [`Batcher::flush_all_due`], called by the owning service's timer loop).
    pub fn queue<R: BatchRow>(&self, row: &R) -> DbResult<()> {
        let key = row.operation_key().to_string();
        let template = row.sql_template().to_string();
        let params = row.parameters();
        let names = extract_parameter_names(&template);
        let safe_size = max_safe_batch_size(names.len().max(1));

        let state = self.operation_state(&key);
        let should_flush = {
            let mut guard = state.batch.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let pending = guard.get_or_insert_with(|| PendingBatch {
                rows: Vec::new(),
                template: template.clone(),
                started_at: Instant::now(),
            });
            pending.rows.push((key.clone(), params));
            pending.rows.len() >= safe_size
        };

        if should_flush {
            self.flush(&key)?;
        }
        Ok(())
    }

    /// Flush every operation key whose oldest row has been waiting at least
    /// [`FLUSH_WINDOW`]. Intended to be driven by a periodic timer.
    pub fn flush_all_due(&self) -> DbResult<()> {
        let keys: Vec<String> = {
            let ops = self.operations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            ops.iter()
                .filter(|(_, state)| {
                    state
                        .batch
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .as_ref()
                        .is_some_and(|b| b.started_at.elapsed() >= FLUSH_WINDOW)
                })
                .map(|(k, _)| k.clone())
                .collect()
        };
        for key in keys {
            self.flush(&key)?;
        }
        Ok(())
    }

    /// Flush the named operation key's current batch under the single-flight
    /// guard, with deadlock retry and recovery-sink fallback.
    pub fn flush(&self, key: &str) -> DbResult<()> {
        let state = self.operation_state(key);
        let _gate = state.flush_gate.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let pending = {
            let mut guard = state.batch.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.take()
        };
        let Some(pending) = pending else {
            return Ok(());
        };
        if pending.rows.is_empty() {
            return Ok(());
        }

        let result = retry_batcher_deadlock(&self.retry_policy, || {
            self.execute_batch(&pending.template, &pending.rows)
        });

        match result {
            Ok(()) => Ok(()),
            Err(DbError::ParameterOverflow(_)) => self.execute_chunked(&pending.template, &pending.rows),
            Err(e) => {
                self.record_recovery(key, &pending.template, &pending.rows, &e.to_string());
                Err(e)
            }
        }
    }

    fn execute_batch(&self, template: &str, rows: &[(String, Vec<JsonValue>)]) -> DbResult<()> {
        let names = extract_parameter_names(template);
        let total_params = names.len() * rows.len();
        if total_params > SAFE_PARAMETER_BUDGET {
            return Err(DbError::ParameterOverflow(format!(
                "{total_params} params exceeds budget {SAFE_PARAMETER_BUDGET}"
            )));
        }

        let mut statements = Vec::with_capacity(rows.len());
        let mut bound: Vec<sqlmodel_core::Value> = Vec::with_capacity(total_params);
        for (slot, (_, params)) in rows.iter().enumerate() {
            statements.push(rewrite_template_for_slot(template, &names, slot));
            bound.extend(params.iter().map(json_to_sql_value));
        }
        let combined = statements.join(";\n");

        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        conn.execute(&combined, &bound).map_err(|e| DbError::Sql(e.to_string()))?;
        Ok(())
    }

    fn execute_chunked(&self, template: &str, rows: &[(String, Vec<JsonValue>)]) -> DbResult<()> {
        let names = extract_parameter_names(template);
        let chunk_size = max_safe_batch_size(names.len().max(1));
        for chunk in rows.chunks(chunk_size) {
            retry_batcher_deadlock(&self.retry_policy, || self.execute_batch(template, chunk))?;
        }
        Ok(())
    }

    fn record_recovery(&self, key: &str, template: &str, rows: &[(String, Vec<JsonValue>)], error: &str) {
        let params_json = serde_json::to_string(
            &rows.iter().map(|(_, p)| p.clone()).collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string());

        let insert = "INSERT INTO batch_recovery \
            (operation_key, sql_template, parameters_json, error_message, operation_count, created_utc) \
            VALUES (?, ?, ?, ?, ?, ?)";

        let result = self.pool.get().and_then(|conn| {
            conn.execute(
                insert,
                &[
                    key.into(),
                    template.into(),
                    params_json.as_str().into(),
                    error.into(),
                    (rows.len() as i64).into(),
                    now_micros().into(),
                ],
            )
        });
        if let Err(e) = result {
            tracing::warn!(operation_key = key, error = %e, "failed to persist batch recovery row");
        }
    }

    /// Run a single statement outside the batcher, propagating errors.
    pub fn execute_immediate(&self, sql: &str, params: &[JsonValue]) -> DbResult<()> {
        let conn = self.pool.get().map_err(|e| DbError::Pool(e.to_string()))?;
        let bound: Vec<sqlmodel_core::Value> = params.iter().map(json_to_sql_value).collect();
        conn.execute(sql, &bound).map_err(|e| DbError::Sql(e.to_string()))
    }

    /// Bounded final flush of every outstanding operation key, used on shutdown.
    pub fn dispose(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let keys: Vec<String> = {
            let ops = self.operations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            ops.keys().cloned().collect()
        };
        for key in keys {
            if Instant::now() >= deadline {
                tracing::warn!("batcher dispose timed out before flushing all operation keys");
                break;
            }
            if let Err(e) = self.flush(&key) {
                tracing::error!(operation_key = %key, error = %e, "final flush failed during dispose");
            }
        }
    }
}

fn json_to_sql_value(v: &JsonValue) -> sqlmodel_core::Value {
    match v {
        JsonValue::Null => sqlmodel_core::Value::Null,
        JsonValue::Bool(b) => (*b).into(),
        JsonValue::Number(n) => n.as_i64().map_or_else(
            || n.as_f64().map_or(sqlmodel_core::Value::Null, Into::into),
            Into::into,
        ),
        JsonValue::String(s) => s.as_str().into(),
        other => other.to_string().as_str().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_distinct_parameter_names_excluding_system_tokens() {
        let template = "INSERT INTO t (a, b) VALUES (@A, @B) -- @@ROWCOUNT unused";
        let names = extract_parameter_names(template);
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn rewrite_avoids_clobbering_prefixed_names() {
        let template = "VALUES (@Id, @IdName)";
        let names = vec!["Id".to_string(), "IdName".to_string()];
        let rewritten = rewrite_template_for_slot(template, &names, 3);
        assert_eq!(rewritten, "VALUES (@p3_Id, @p3_IdName)");
    }

    #[test]
    fn max_safe_batch_size_matches_formula() {
        assert_eq!(max_safe_batch_size(10), 100);
        assert_eq!(max_safe_batch_size(50), 38);
        assert_eq!(max_safe_batch_size(0), DEFAULT_MAX_BATCH_SIZE);
    }

    #[test]
    fn max_safe_batch_size_never_below_one() {
        assert_eq!(max_safe_batch_size(10_000), 1);
    }
}
