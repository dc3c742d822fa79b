use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Filter kinds understood by the SQL filters and the stored procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Category,
    Range,
    Bbox,
}

impl FilterType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Range => "range",
            Self::Bbox => "bbox",
        }
    }
}

/// Raw widget filter parameters, e.g. `{"accept": ["a"]}` or `{"min": 0, "max": 10}`.
pub type FilterParams = Map<String, Value>;

/// A filter declared on an analysis node: `{ type, column, params }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    #[serde(rename = "type")]
    pub kind: FilterType,
    pub column: String,
    #[serde(default)]
    pub params: FilterParams,
}

impl FilterDefinition {
    pub fn new(kind: FilterType, column: impl Into<String>, params: FilterParams) -> Self {
        Self {
            kind,
            column: column.into(),
            params,
        }
    }
}

/// Widget filters active across the whole dashboard for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestFilters {
    #[serde(default)]
    pub dataviews: IndexMap<String, FilterParams>,
}

impl RequestFilters {
    /// Parse the `filters` request parameter.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn get(&self, dataview: &str) -> Option<&FilterParams> {
        self.dataviews.get(dataview)
    }

    pub fn is_empty(&self) -> bool {
        self.dataviews.is_empty()
    }
}
