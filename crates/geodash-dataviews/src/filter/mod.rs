//! SQL filters wrapping a base query.
//!
//! Every filter turns `sql` into `SELECT * FROM (sql) <alias> WHERE <predicate>`,
//! so filters compose by nesting.

mod bbox;
mod category;
mod range;

pub use bbox::{BBox, BBoxFilter, MAX_LATITUDE};
pub use category::CategoryFilter;
pub(crate) use category::dollar_quote;
pub use range::RangeFilter;

use geodash_core::rewrite::{GEOGRAPHIC_SRID, WEBMERCATOR_COLUMN, WEBMERCATOR_SRID};
use geodash_core::{DataviewError, FilterDefinition, FilterType, Result};

/// A node or widget filter ready to be applied to SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Category(CategoryFilter),
    Range(RangeFilter),
    BBox(BBoxFilter),
}

impl Filter {
    pub fn from_definition(def: &FilterDefinition) -> Result<Self> {
        match def.kind {
            FilterType::Category => {
                CategoryFilter::from_params(&def.column, &def.params).map(Self::Category)
            }
            FilterType::Range => {
                RangeFilter::from_params(&def.column, &def.params).map(Self::Range)
            }
            FilterType::Bbox => {
                let raw = def
                    .params
                    .get("bbox")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| DataviewError::invalid_bbox(""))?;
                let srid = if def.column == WEBMERCATOR_COLUMN {
                    WEBMERCATOR_SRID
                } else {
                    GEOGRAPHIC_SRID
                };
                BBoxFilter::new(&def.column, srid, raw).map(Self::BBox)
            }
        }
    }

    pub fn sql(&self, query: &str) -> String {
        match self {
            Self::Category(f) => f.sql(query),
            Self::Range(f) => f.sql(query),
            Self::BBox(f) => f.sql(query),
        }
    }
}

/// Validate a column or table reference before it is spliced into SQL.
///
/// Accepts dotted plain identifiers (`schema.table`, `pop_max`) and a single
/// double-quoted identifier without embedded quotes.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(DataviewError::invalid_identifier("Empty identifier"));
    }

    if let Some(inner) = name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
        if inner.is_empty() || inner.contains('"') {
            return Err(DataviewError::invalid_identifier(name));
        }
        return Ok(name);
    }

    let plain = name.split('.').all(|segment| {
        !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
    if !plain {
        return Err(DataviewError::invalid_identifier(name));
    }
    Ok(name)
}

/// Format a number for SQL, keeping integral values free of a fractional part.
pub(crate) fn sql_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
