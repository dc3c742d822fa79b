//! Map configuration as produced by the map-configuration compiler.
//!
//! This crate only reads these values. They are created once per map
//! configuration and shared read-only by every request against it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dataview::DataviewDefinition;
use crate::rewrite::QueryRewriteData;

/// A compiled map configuration: layers plus the dataviews backed by them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub layers: Vec<Layer>,
    /// Dataviews keyed by name, in declaration order
    #[serde(default)]
    pub dataviews: IndexMap<String, DataviewDefinition>,
}

impl MapConfig {
    /// Parse a map configuration from its JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn dataview(&self, name: &str) -> Option<&DataviewDefinition> {
        self.dataviews.get(name)
    }

    /// Find the layer bound to the given source id.
    pub fn source_layer(&self, source_id: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| {
            layer
                .options
                .source
                .as_ref()
                .is_some_and(|source| source.id == source_id)
        })
    }

    /// Dataviews reading from the given source, in declaration order.
    pub fn dataviews_for_source<'a>(
        &'a self,
        source_id: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a DataviewDefinition)> + 'a {
        self.dataviews
            .iter()
            .filter(move |(_, def)| def.source.id == source_id)
            .map(|(name, def)| (name.as_str(), def))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layer {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub options: LayerOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerOptions {
    /// Datasource query of the layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,
    /// Overview metadata, present only when overview tables exist for the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_rewrite_data: Option<QueryRewriteData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
}

impl SourceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
