use serde_json::Value;

use geodash_core::{DataviewError, FilterParams, Result};

use super::{sql_number, validate_identifier};

/// `accept` / `reject` membership filter over one column.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFilter {
    column: String,
    accept: Option<Vec<Value>>,
    reject: Option<Vec<Value>>,
}

impl CategoryFilter {
    pub fn from_params(column: &str, params: &FilterParams) -> Result<Self> {
        let column = validate_identifier(column)?.to_string();
        let list = |key: &str| -> Result<Option<Vec<Value>>> {
            match params.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Array(values)) => Ok(Some(values.clone())),
                Some(_) => Err(DataviewError::invalid_filters(format!(
                    "Category filter '{key}' must be an array"
                ))),
            }
        };

        let accept = list("accept")?;
        let reject = list("reject")?;
        if accept.is_none() && reject.is_none() {
            return Err(DataviewError::invalid_filters(
                "Category filter expects at least one array in accept or reject params",
            ));
        }

        Ok(Self {
            column,
            accept,
            reject,
        })
    }

    pub fn sql(&self, query: &str) -> String {
        let mut conditions = Vec::new();

        if let Some(accept) = &self.accept {
            if accept.is_empty() {
                conditions.push("0 = 1".to_string());
            } else {
                conditions.push(format!("{} IN ({})", self.column, literal_list(accept)));
            }
        }
        if let Some(reject) = self.reject.as_ref().filter(|r| !r.is_empty()) {
            conditions.push(format!("{} NOT IN ({})", self.column, literal_list(reject)));
        }
        if conditions.is_empty() {
            conditions.push("1 = 1".to_string());
        }

        format!(
            "SELECT * FROM ({query}) _cdb_category_filter WHERE {}",
            conditions.join(" AND ")
        )
    }
}

fn literal_list(values: &[Value]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| literal(i, value))
        .collect::<Vec<_>>()
        .join(",")
}

fn literal(index: usize, value: &Value) -> String {
    match value {
        Value::Number(n) => n.as_f64().map(sql_number).unwrap_or_else(|| n.to_string()),
        Value::Bool(b) => b.to_string(),
        Value::Null => "NULL".to_string(),
        Value::String(s) => dollar_quote(index, s),
        other => dollar_quote(index, &other.to_string()),
    }
}

/// Dollar-quote a string with a tag that does not occur in it.
pub(crate) fn dollar_quote(index: usize, value: &str) -> String {
    let mut tag = format!("$escape_{index}$");
    while value.contains(&tag) {
        tag.insert(tag.len() - 1, '_');
    }
    format!("{tag}{value}{tag}")
}
