use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use tracing::instrument;

use geodash_dataviews::{QueryRunner, Row};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};
use crate::pool::create_pool;

/// [`QueryRunner`] over a PostgreSQL pool.
///
/// Each statement is wrapped so rows come back as one JSON object per row,
/// whatever the shape of the dataview query.
#[derive(Debug, Clone)]
pub struct PostgresRunner {
    pool: PgPool,
}

impl PostgresRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        Ok(Self::new(create_pool(config).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn as_json_rows(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';');
    format!("SELECT row_to_json(_cdb_row) AS row FROM ({sql}) _cdb_row")
}

#[async_trait]
impl QueryRunner for PostgresRunner {
    #[instrument(skip_all)]
    async fn query(&self, sql: &str) -> geodash_core::Result<Vec<Row>> {
        let wrapped = as_json_rows(sql);
        let rows: Vec<(Value,)> = query_as(&wrapped)
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|(row,)| match row {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_wrapped_as_json() {
        assert_eq!(
            as_json_rows("SELECT 1 AS a;\n"),
            "SELECT row_to_json(_cdb_row) AS row FROM (SELECT 1 AS a) _cdb_row"
        );
    }
}
