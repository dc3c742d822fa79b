use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::filters::{FilterDefinition, FilterType};
use crate::mapconfig::SourceRef;

/// Dataview kinds. The set is closed: unknown kinds are rejected when the
/// map configuration is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataviewType {
    Histogram,
    Aggregation,
    Category,
    Formula,
}

impl DataviewType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Histogram => "histogram",
            Self::Aggregation => "aggregation",
            Self::Category => "category",
            Self::Formula => "formula",
        }
    }

    /// Filter type contributed by a widget of this kind, if any.
    pub fn filter_type(self) -> Option<FilterType> {
        match self {
            Self::Aggregation | Self::Category => Some(FilterType::Category),
            Self::Histogram => Some(FilterType::Range),
            Self::Formula => None,
        }
    }
}

impl fmt::Display for DataviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dataview as compiled into the map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataviewDefinition {
    #[serde(rename = "type")]
    pub kind: DataviewType,
    #[serde(default)]
    pub options: DataviewOptions,
    pub sql: DataviewSql,
    pub source: SourceRef,
    #[serde(default)]
    pub node: NodeRef,
}

impl DataviewDefinition {
    /// Column the dataview operates on, empty when not configured.
    pub fn column(&self) -> &str {
        self.options.column.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataviewOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bins: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(
        rename = "aggregationColumn",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub aggregation_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Number,
    Date,
}

/// The three precompiled SQL variants of a dataview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataviewSql {
    pub own_filter_on: String,
    pub own_filter_off: String,
    pub no_filters: String,
}

/// Analysis node the dataview reads from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRef {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Filters declared on the node, keyed by the dataview that owns them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<IndexMap<String, FilterDefinition>>,
}

impl NodeRef {
    /// Direct source nodes (as opposed to derived analysis nodes).
    pub fn is_source(&self) -> bool {
        self.kind == "source"
    }
}
