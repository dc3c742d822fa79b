//! Request parameter validation and casting.
//!
//! Numeric parameters follow the casting rules the HTTP API has always
//! exposed: whitespace is ignored, an empty value is `0`, radix prefixes
//! (`0x`, `0o`, `0b`) are honored and anything that does not end up as a
//! finite number is rejected.

use geodash_core::{DataviewError, DataviewSql, RequestFilters, Result};
use serde::Deserialize;

/// Raw query parameters of a dataview or search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestParams {
    #[serde(default)]
    pub own_filter: Option<String>,
    #[serde(default)]
    pub no_filters: Option<String>,
    #[serde(default)]
    pub bbox: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub bins: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub aggregation: Option<String>,
    /// Search text (search path only)
    #[serde(default)]
    pub q: Option<String>,
    /// JSON-encoded `RequestFilters`
    #[serde(default)]
    pub filters: Option<String>,
}

/// Which precompiled SQL variant a request reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Ignore every widget filter, the dataview's own included
    NoFilters,
    /// Apply the dataview's own filter against itself
    OwnFilterOn,
    /// Reflect sibling filters only (cross-filtering)
    OwnFilterOff,
}

impl FilterMode {
    pub fn select(self, sql: &DataviewSql) -> &str {
        match self {
            Self::NoFilters => &sql.no_filters,
            Self::OwnFilterOn => &sql.own_filter_on,
            Self::OwnFilterOff => &sql.own_filter_off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoFilters => "no_filters",
            Self::OwnFilterOn => "own_filter_on",
            Self::OwnFilterOff => "own_filter_off",
        }
    }
}

/// Typed override values handed to dataview strategies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideParams {
    pub own_filter: bool,
    pub no_filters: bool,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub bins: Option<f64>,
    pub offset: Option<f64>,
    pub categories: Option<f64>,
    /// Passed through untyped; validated by the strategy that uses it
    pub aggregation: Option<String>,
}

impl OverrideParams {
    pub fn with_own_filter(own_filter: bool) -> Self {
        Self {
            own_filter,
            ..Default::default()
        }
    }
}

/// Cast a raw parameter value to a number. Returns NaN when it cannot be cast.
pub fn cast_number(raw: &str) -> f64 {
    let value = raw.trim();
    if value.is_empty() {
        return 0.0;
    }

    let radix = match value.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&value[2..], radix)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }

    match value.parse::<f64>() {
        // "inf"/"nan" spellings are not numbers for the API
        Ok(n) if n.is_finite() || value.trim_start_matches(['+', '-']) == "Infinity" => n,
        _ => f64::NAN,
    }
}

fn finite(raw: Option<&str>) -> Option<f64> {
    raw.map(cast_number).filter(|n| n.is_finite())
}

fn truthy(raw: Option<&str>) -> bool {
    raw.map(cast_number).is_some_and(|n| n != 0.0 && !n.is_nan())
}

impl RequestParams {
    /// Build parameters from decoded key/value pairs, ignoring unknown keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "own_filter" => &mut params.own_filter,
                "no_filters" => &mut params.no_filters,
                "bbox" => &mut params.bbox,
                "start" => &mut params.start,
                "end" => &mut params.end,
                "bins" => &mut params.bins,
                "offset" => &mut params.offset,
                "categories" => &mut params.categories,
                "aggregation" => &mut params.aggregation,
                "q" => &mut params.q,
                "filters" => &mut params.filters,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }

    /// `own_filter` and `no_filters` may not both be finite numbers, whatever their values.
    pub fn validate_filter_flags(&self) -> Result<()> {
        let own_filter = finite(self.own_filter.as_deref());
        let no_filters = finite(self.no_filters.as_deref());
        if own_filter.is_some() && no_filters.is_some() {
            return Err(DataviewError::ConflictingFilterFlags);
        }
        Ok(())
    }

    /// Resolve the SQL variant: `no_filters` first, then `own_filter=1`, else own filter off.
    pub fn filter_mode(&self) -> FilterMode {
        if truthy(self.no_filters.as_deref()) {
            FilterMode::NoFilters
        } else if self.own_filter.as_deref().map(cast_number) == Some(1.0) {
            FilterMode::OwnFilterOn
        } else {
            FilterMode::OwnFilterOff
        }
    }

    /// Boolean reading of `own_filter` (any non-zero number).
    pub fn own_filter(&self) -> bool {
        truthy(self.own_filter.as_deref())
    }

    /// Cast the numeric overrides, failing on the first one that is not a finite number.
    pub fn override_params(&self) -> Result<OverrideParams> {
        let mut overrides = OverrideParams {
            own_filter: self.own_filter(),
            no_filters: self.filter_mode() == FilterMode::NoFilters,
            ..Default::default()
        };

        let numeric = [
            ("start", &self.start, &mut overrides.start),
            ("end", &self.end, &mut overrides.end),
            ("bins", &self.bins, &mut overrides.bins),
            ("offset", &self.offset, &mut overrides.offset),
            ("categories", &self.categories, &mut overrides.categories),
        ];
        for (name, raw, slot) in numeric {
            if let Some(raw) = raw {
                let value = cast_number(raw);
                if !value.is_finite() {
                    return Err(DataviewError::invalid_number(name));
                }
                *slot = Some(value);
            }
        }

        overrides.aggregation = self.aggregation.clone();
        Ok(overrides)
    }

    /// Active widget filters sent with the request, empty when absent.
    pub fn request_filters(&self) -> Result<RequestFilters> {
        match self.filters.as_deref() {
            None => Ok(RequestFilters::default()),
            Some(raw) if raw.trim().is_empty() => Ok(RequestFilters::default()),
            Some(raw) => RequestFilters::from_json(raw)
                .map_err(|e| DataviewError::invalid_filters(e.to_string())),
        }
    }

    /// The bbox parameter, treating an empty value as absent.
    pub fn bbox(&self) -> Option<&str> {
        self.bbox.as_deref().filter(|b| !b.is_empty())
    }
}
