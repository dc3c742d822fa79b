use serde_json::{Value, json};

use geodash_core::{DataviewError, DataviewOptions, DataviewType, Result};

use super::{Aggregates, Dataview, Operation};
use crate::db::{Row, row_number};
use crate::filter::validate_identifier;
use crate::params::OverrideParams;

/// Single aggregate over the whole query.
#[derive(Debug, Clone)]
pub struct Formula {
    operation: Operation,
    column: Option<String>,
}

impl Formula {
    pub fn new(options: &DataviewOptions) -> Result<Self> {
        let operation = options
            .operation
            .as_deref()
            .ok_or_else(|| DataviewError::invalid_option("Formula expects `operation` in options"))
            .and_then(Operation::parse)?;

        let column = match (operation, options.column.as_deref()) {
            (Operation::Count, column) => column.map(validate_identifier).transpose()?,
            (_, Some(column)) => Some(validate_identifier(column)?),
            (_, None) => {
                return Err(DataviewError::invalid_option(format!(
                    "Formula expects `column` in options for operation '{operation}'"
                )));
            }
        };

        Ok(Self {
            operation,
            column: column.map(str::to_string),
        })
    }
}

impl Dataview for Formula {
    fn kind(&self) -> DataviewType {
        DataviewType::Formula
    }

    fn sql(&self, query: &str, aggregates: Aggregates, _overrides: &OverrideParams) -> Result<String> {
        let column = self.column.as_deref().unwrap_or("1");
        let result = aggregates.apply(self.operation, column);
        let nulls = match &self.column {
            Some(column) => aggregates.nulls(column),
            None => "0".to_string(),
        };
        Ok(format!(
            "SELECT {result} AS result, {nulls} AS nulls_count\nFROM ({query}) __cdb_formula"
        ))
    }

    fn format(&self, rows: &[Row], _overrides: &OverrideParams) -> Result<Value> {
        let row = rows.first();
        Ok(json!({
            "type": DataviewType::Formula.as_str(),
            "operation": self.operation.as_str(),
            "result": row.map_or(Value::Null, |row| row_number(row, "result")),
            "nulls": row.map_or(json!(0), |row| row_number(row, "nulls_count")),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(options: Value) -> Result<Formula> {
        let options: DataviewOptions = serde_json::from_value(options).unwrap();
        Formula::new(&options)
    }

    #[test]
    fn test_count_without_column() {
        let f = formula(json!({ "operation": "count" })).unwrap();
        let sql = f.sql("select * from t", Aggregates::Raw, &OverrideParams::default()).unwrap();
        assert_eq!(
            sql,
            "SELECT count(*) AS result, 0 AS nulls_count\nFROM (select * from t) __cdb_formula"
        );
    }

    #[test]
    fn test_weighted_avg() {
        let f = formula(json!({ "operation": "avg", "column": "pop_max" })).unwrap();
        let sql = f.sql("q", Aggregates::Weighted, &OverrideParams::default()).unwrap();
        assert!(sql.starts_with("SELECT sum(pop_max * _feature_count)::numeric / sum(_feature_count) AS result"));
    }

    #[test]
    fn test_validation() {
        assert!(formula(json!({ "operation": "sum" })).is_err());
        assert!(formula(json!({ "operation": "median", "column": "x" })).is_err());
        assert!(formula(json!({ "column": "x" })).is_err());
    }

    #[test]
    fn test_format() {
        let f = formula(json!({ "operation": "sum", "column": "pop" })).unwrap();
        let rows: Vec<Row> =
            serde_json::from_value(json!([{ "result": "1234.5", "nulls_count": 2 }])).unwrap();
        let result = f.format(&rows, &OverrideParams::default()).unwrap();
        assert_eq!(
            result,
            json!({ "type": "formula", "operation": "sum", "result": 1234.5, "nulls": 2 })
        );
    }
}
