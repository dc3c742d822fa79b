//! Database seam used by dataview strategies.
//!
//! Every strategy call issues exactly one statement through this trait.
//! Timeouts are enforced by the implementation (a statement timeout), never
//! retried here.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::debug;

use geodash_core::Result;

/// One result row keyed by column name.
pub type Row = Map<String, Value>;

/// Executes a single SQL statement and returns its rows as JSON objects.
///
/// Implementations must be thread-safe (`Send + Sync`) since one runner is
/// shared by all concurrent requests.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;
}

/// Run one statement and log its cost.
pub(crate) async fn fetch(db: &dyn QueryRunner, sql: &str) -> Result<Vec<Row>> {
    let started = Instant::now();
    let rows = db.query(sql).await?;
    debug!(
        rows = rows.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dataview query executed"
    );
    Ok(rows)
}

/// Read a numeric column, accepting numbers and numeric strings (`numeric` values).
pub(crate) fn row_f64(row: &Row, column: &str) -> Option<f64> {
    match row.get(column)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a numeric column as JSON, mapping unreadable values to `null`.
pub(crate) fn row_number(row: &Row, column: &str) -> Value {
    row_f64(row, column).map_or(Value::Null, number)
}

/// JSON number for a float, integral values rendered without a fraction.
pub(crate) fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}
