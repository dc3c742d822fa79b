//! Shared fixtures for the backend tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Mutex;

use geodash_core::{DataviewError, MapConfig, Result};
use geodash_dataviews::{QueryRunner, RequestParams, Row};

/// Query runner that records every statement and replays canned rows.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    statements: Mutex<Vec<String>>,
    rows: Vec<Row>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay `rows` (a JSON array of objects) for every statement.
    pub fn with_rows(rows: Value) -> Self {
        let rows = rows
            .as_array()
            .map(|rows| rows.iter().filter_map(|row| row.as_object().cloned()).collect())
            .unwrap_or_default();
        Self {
            statements: Mutex::new(Vec::new()),
            rows,
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// The only statement issued, failing the test otherwise.
    pub fn single_statement(&self) -> String {
        let statements = self.statements();
        assert_eq!(statements.len(), 1, "expected one round trip, got {statements:?}");
        statements[0].clone()
    }
}

#[async_trait]
impl QueryRunner for RecordingRunner {
    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(self.rows.clone())
    }
}

/// Runner whose every statement fails like a database error would.
#[derive(Debug)]
pub struct FailingRunner;

#[async_trait]
impl QueryRunner for FailingRunner {
    async fn query(&self, _sql: &str) -> Result<Vec<Row>> {
        Err(DataviewError::database("relation \"rivers\" does not exist"))
    }
}

pub fn params(pairs: &[(&str, &str)]) -> RequestParams {
    RequestParams::from_pairs(pairs.iter().map(|(k, v)| (*k, v.to_string())))
}

pub const RIVERS_ON: &str = "SELECT * FROM rivers WHERE flow > 10 AND length > 100";
pub const RIVERS_OFF: &str = "SELECT * FROM rivers WHERE flow > 10";
pub const RIVERS_NO_FILTERS: &str = "SELECT * FROM rivers";

/// A dashboard with three sources:
/// - `a0`: populated places with overview tables at zoom 0 and 8
/// - `b0`: a pre-aggregated `tt_sales` table
/// - `c0`: rivers, no rewrite metadata
pub fn dashboard() -> MapConfig {
    let places_sql = json!({
        "own_filter_on": "SELECT * FROM populated_places",
        "own_filter_off": "SELECT * FROM populated_places WHERE adm0name IN ('Spain')",
        "no_filters": "SELECT * FROM populated_places WHERE true"
    });
    let places_node = json!({
        "type": "source",
        "filters": {
            "pop_max": { "type": "range", "column": "pop_max", "params": { "min": 100000 } },
            "country": { "type": "category", "column": "adm0name", "params": { "accept": ["Spain"] } }
        }
    });
    let sales_sql = json!({
        "own_filter_on": "select * from tt_sales",
        "own_filter_off": "select * from tt_sales",
        "no_filters": "select * from tt_sales"
    });
    let rivers_sql = json!({
        "own_filter_on": RIVERS_ON,
        "own_filter_off": RIVERS_OFF,
        "no_filters": RIVERS_NO_FILTERS
    });

    serde_json::from_value(json!({
        "version": "1.5.0",
        "layers": [
            {
                "type": "cartodb",
                "options": {
                    "sql": "SELECT * FROM populated_places",
                    "source": { "id": "a0" },
                    "query_rewrite_data": {
                        "overviews": {
                            "populated_places": {
                                "0": { "table": "_vovw_0_populated_places" },
                                "8": { "table": "_vovw_8_populated_places" }
                            }
                        }
                    }
                }
            },
            {
                "type": "cartodb",
                "options": { "sql": "select * from tt_sales", "source": { "id": "b0" } }
            },
            {
                "type": "cartodb",
                "options": { "sql": RIVERS_NO_FILTERS, "source": { "id": "c0" } }
            }
        ],
        "dataviews": {
            "pop_max": {
                "type": "histogram",
                "options": { "column": "pop_max", "bins": 10 },
                "sql": places_sql,
                "source": { "id": "a0" },
                "node": places_node
            },
            "country": {
                "type": "aggregation",
                "options": { "column": "adm0name", "aggregation": "count" },
                "sql": places_sql,
                "source": { "id": "a0" },
                "node": places_node
            },
            "price": {
                "type": "histogram",
                "options": { "column": "price" },
                "sql": sales_sql,
                "source": { "id": "b0" },
                "node": { "type": "source" }
            },
            "store": {
                "type": "aggregation",
                "options": { "column": "store", "aggregation": "count" },
                "sql": sales_sql,
                "source": { "id": "b0" },
                "node": { "type": "source" }
            },
            "total": {
                "type": "formula",
                "options": { "operation": "count" },
                "sql": sales_sql,
                "source": { "id": "b0" },
                "node": { "type": "source" }
            },
            "length": {
                "type": "formula",
                "options": { "operation": "sum", "column": "length" },
                "sql": rivers_sql,
                "source": { "id": "c0" },
                "node": { "type": "source" }
            },
            "basin": {
                "type": "category",
                "options": { "column": "basin", "aggregation": "count" },
                "sql": rivers_sql,
                "source": { "id": "c0" },
                "node": { "type": "source" }
            }
        }
    }))
    .unwrap()
}
