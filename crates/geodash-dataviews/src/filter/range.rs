use serde_json::Value;

use geodash_core::{DataviewError, FilterParams, Result};

use super::{sql_number, validate_identifier};
use crate::params::cast_number;

/// Numeric `min` / `max` filter over one column.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    column: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl RangeFilter {
    pub fn new(column: &str, min: Option<f64>, max: Option<f64>) -> Result<Self> {
        let column = validate_identifier(column)?.to_string();
        if min.is_none() && max.is_none() {
            return Err(DataviewError::invalid_filters(
                "Range filter expects at least min or max numeric params",
            ));
        }
        Ok(Self { column, min, max })
    }

    pub fn from_params(column: &str, params: &FilterParams) -> Result<Self> {
        Self::new(column, bound(params, "min")?, bound(params, "max")?)
    }

    pub fn sql(&self, query: &str) -> String {
        let predicate = match (self.min, self.max) {
            (Some(min), Some(max)) => format!(
                "{} BETWEEN {} AND {}",
                self.column,
                sql_number(min),
                sql_number(max)
            ),
            (Some(min), None) => format!("{} >= {}", self.column, sql_number(min)),
            (None, Some(max)) => format!("{} <= {}", self.column, sql_number(max)),
            (None, None) => "1 = 1".to_string(),
        };
        format!("SELECT * FROM ({query}) _cdb_range_filter WHERE {predicate}")
    }
}

fn bound(params: &FilterParams, key: &str) -> Result<Option<f64>> {
    let value = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => Some(cast_number(s)),
        Some(_) => None,
    };
    match value {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(DataviewError::invalid_filters(format!(
            "Range filter '{key}' must be a number"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> FilterParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_open_ranges() {
        let min = RangeFilter::from_params("pop", &params(json!({ "min": 5 }))).unwrap();
        assert!(min.sql("q").ends_with("WHERE pop >= 5"));

        let max = RangeFilter::from_params("pop", &params(json!({ "max": "7.5" }))).unwrap();
        assert!(max.sql("q").ends_with("WHERE pop <= 7.5"));
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(RangeFilter::from_params("pop", &params(json!({}))).is_err());
        assert!(RangeFilter::from_params("pop", &params(json!({ "min": "abc" }))).is_err());
        assert!(RangeFilter::from_params("pop", &params(json!({ "min": [1] }))).is_err());
    }
}
