use serde_json::{Value, json};

use geodash_core::{DataviewError, DataviewOptions, DataviewType, Result};

use super::{Aggregates, Dataview, Operation};
use crate::db::{Row, row_number};
use crate::filter::{dollar_quote, validate_identifier};
use crate::params::OverrideParams;

/// Category breakdown: top categories by an aggregated value plus an `Other` bucket.
#[derive(Debug, Clone)]
pub struct Aggregation {
    kind: DataviewType,
    column: String,
    aggregation: Option<String>,
    aggregation_column: Option<String>,
    default_categories: u32,
    search_limit: u32,
}

impl Aggregation {
    pub fn new(
        kind: DataviewType,
        options: &DataviewOptions,
        default_categories: u32,
        search_limit: u32,
    ) -> Result<Self> {
        let column = options.column.as_deref().ok_or_else(|| {
            DataviewError::invalid_option("Aggregation expects `column` in options")
        })?;
        let aggregation_column = options
            .aggregation_column
            .as_deref()
            .map(validate_identifier)
            .transpose()?
            .map(str::to_string);

        Ok(Self {
            kind,
            column: validate_identifier(column)?.to_string(),
            aggregation: options.aggregation.clone(),
            aggregation_column,
            default_categories,
            search_limit,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Operation and the column it applies to: override, then definition, then `count`.
    pub fn operation(&self, overrides: &OverrideParams) -> Result<(Operation, &str)> {
        let name = overrides
            .aggregation
            .as_deref()
            .or(self.aggregation.as_deref())
            .unwrap_or("count");
        let operation = Operation::parse(name)?;
        if operation == Operation::Count {
            return Ok((operation, "1"));
        }
        let column = self.aggregation_column.as_deref().ok_or_else(|| {
            DataviewError::invalid_option(format!(
                "Aggregation column is required for aggregation '{operation}'"
            ))
        })?;
        Ok((operation, column))
    }

    fn categories(&self, overrides: &OverrideParams) -> Result<u32> {
        let Some(categories) = overrides.categories else {
            return Ok(self.default_categories);
        };
        if categories.fract() != 0.0 || categories < 1.0 || categories > f64::from(u32::MAX) {
            return Err(DataviewError::invalid_option(format!(
                "Invalid number of categories '{categories}', expected a positive integer"
            )));
        }
        Ok(categories as u32)
    }
}

/// `ILIKE` pattern matching `text` anywhere, with LIKE wildcards escaped.
fn contains_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    dollar_quote(0, &escaped)
}

impl Dataview for Aggregation {
    fn kind(&self) -> DataviewType {
        self.kind
    }

    fn sql(&self, query: &str, aggregates: Aggregates, overrides: &OverrideParams) -> Result<String> {
        let (operation, value_column) = self.operation(overrides)?;
        let limit = self.categories(overrides)?;
        let c = &self.column;
        let value = aggregates.apply(operation, value_column);
        let rollup = operation.rollup();
        let count = aggregates.count();
        let nulls = aggregates.nulls(c);

        Ok(format!(
            "WITH
__cdb_source AS (
  SELECT * FROM ({query}) __cdb_aggregation_src
),
__cdb_categories AS (
  SELECT {c} AS category, {value} AS value
  FROM __cdb_source
  WHERE {c} IS NOT NULL
  GROUP BY {c}
),
__cdb_ranked AS (
  SELECT category, value, row_number() OVER (ORDER BY value DESC NULLS LAST, category) AS rank
  FROM __cdb_categories
),
__cdb_summary AS (
  SELECT {count} AS count, {nulls} AS nulls_count
  FROM __cdb_source
),
__cdb_stats AS (
  SELECT count(*) AS categories_count, min(value) AS min_val, max(value) AS max_val
  FROM __cdb_categories
)
SELECT category::text AS category, value, false AS agg, count, nulls_count, categories_count, min_val, max_val
FROM __cdb_ranked, __cdb_summary, __cdb_stats
WHERE rank <= {limit}
UNION ALL
SELECT 'Other' AS category, {rollup}(value) AS value, true AS agg, count, nulls_count, categories_count, min_val, max_val
FROM __cdb_ranked, __cdb_summary, __cdb_stats
WHERE rank > {limit}
GROUP BY count, nulls_count, categories_count, min_val, max_val
ORDER BY agg, value DESC"
        ))
    }

    fn format(&self, rows: &[Row], overrides: &OverrideParams) -> Result<Value> {
        let (operation, _) = self.operation(overrides)?;
        let summary = |column: &str| rows.first().map_or(json!(0), |row| row_number(row, column));
        let categories = rows
            .iter()
            .map(|row| {
                json!({
                    "category": row.get("category").cloned().unwrap_or(Value::Null),
                    "value": row_number(row, "value"),
                    "agg": row.get("agg").and_then(Value::as_bool).unwrap_or(false),
                })
            })
            .collect::<Vec<_>>();

        Ok(json!({
            "type": DataviewType::Aggregation.as_str(),
            "aggregation": operation.as_str(),
            "count": summary("count"),
            "nulls": summary("nulls_count"),
            "min": rows.first().map_or(Value::Null, |row| row_number(row, "min_val")),
            "max": rows.first().map_or(Value::Null, |row| row_number(row, "max_val")),
            "categoriesCount": summary("categories_count"),
            "categories": categories,
        }))
    }

    fn search_sql(&self, query: &str, text: &str) -> Result<String> {
        let (operation, value_column) = self.operation(&OverrideParams::default())?;
        let c = &self.column;
        let value = Aggregates::Raw.apply(operation, value_column);
        let pattern = contains_pattern(text);
        let limit = self.search_limit;

        Ok(format!(
            "SELECT {c}::text AS category, {value} AS value
FROM ({query}) __cdb_search_src
WHERE {c}::text ILIKE {pattern}
GROUP BY {c}
ORDER BY value DESC NULLS LAST
LIMIT {limit}"
        ))
    }

    fn format_search(&self, rows: &[Row]) -> Result<Value> {
        let categories = rows
            .iter()
            .map(|row| {
                json!({
                    "category": row.get("category").cloned().unwrap_or(Value::Null),
                    "value": row_number(row, "value"),
                })
            })
            .collect::<Vec<_>>();
        Ok(json!({
            "type": DataviewType::Aggregation.as_str(),
            "categories": categories,
        }))
    }
}
