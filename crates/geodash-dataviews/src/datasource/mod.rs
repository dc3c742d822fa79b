//! Datasources backing layers and dataviews.

mod preaggregated;

pub use preaggregated::{
    Manifest, ManifestAggregation, ManifestFilter, PRE_AGGREGATED_TYPE, PreAggregatedDatasource,
    PreAggregatedDataview, PreAggregatedMatcher, SupportsRampAggregation,
};

use indexmap::IndexMap;
use std::fmt;

use geodash_core::{FilterDefinition, Layer};

/// Query and metadata access shared by plain and adapted datasources.
pub trait Datasource: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    /// Query a renderer runs against this datasource.
    fn get_query(&self) -> String;

    /// Pre-aggregation manifest, `None` for plain SQL datasources.
    fn get_metadata(&self) -> Option<&Manifest>;

    fn get_filters(&self) -> IndexMap<String, FilterDefinition>;

    fn get_type(&self) -> &'static str;
}

/// A layer's SQL as configured.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlDatasource {
    id: String,
    query: String,
    filters: IndexMap<String, FilterDefinition>,
}

impl SqlDatasource {
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            filters: IndexMap::new(),
        }
    }

    pub fn with_filters(mut self, filters: IndexMap<String, FilterDefinition>) -> Self {
        self.filters = filters;
        self
    }

    /// Datasource of a layer with both a source id and SQL.
    pub fn from_layer(layer: &Layer) -> Option<Self> {
        let source = layer.options.source.as_ref()?;
        let sql = layer.options.sql.as_ref()?;
        Some(Self::new(&source.id, sql))
    }
}

impl Datasource for SqlDatasource {
    fn id(&self) -> &str {
        &self.id
    }

    fn get_query(&self) -> String {
        self.query.clone()
    }

    fn get_metadata(&self) -> Option<&Manifest> {
        None
    }

    fn get_filters(&self) -> IndexMap<String, FilterDefinition> {
        self.filters.clone()
    }

    fn get_type(&self) -> &'static str {
        "sql"
    }
}
