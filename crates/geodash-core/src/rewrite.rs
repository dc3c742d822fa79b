//! Query-rewrite metadata attached to source layers that have overview tables.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::filters::{FilterDefinition, FilterType};

/// Geometry column of the projected (web mercator) geometry.
pub const WEBMERCATOR_COLUMN: &str = "the_geom_webmercator";
/// Geometry column in geographic coordinates.
pub const GEOGRAPHIC_COLUMN: &str = "the_geom";
pub const WEBMERCATOR_SRID: u32 = 3857;
pub const GEOGRAPHIC_SRID: u32 = 4326;

/// Per-source rewrite metadata.
///
/// `overviews` and `zoom_level` come from the map-configuration compiler;
/// `filters`, `unfiltered_query` and `bbox_filter` are filled in per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRewriteData {
    /// Base table name -> overview zoom -> overview table
    #[serde(default)]
    pub overviews: BTreeMap<String, BTreeMap<u8, OverviewTier>>,
    /// SQL expression computing the zoom level (tile path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<IndexMap<String, FilterDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unfiltered_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox_filter: Option<BBoxFilterDefinition>,
}

impl QueryRewriteData {
    pub fn with_overviews<T: Into<String>>(
        table: impl Into<String>,
        tiers: impl IntoIterator<Item = (u8, T)>,
    ) -> Self {
        let tiers = tiers
            .into_iter()
            .map(|(z, t)| (z, OverviewTier::new(t)))
            .collect();
        let mut overviews = BTreeMap::new();
        overviews.insert(table.into(), tiers);
        Self {
            overviews,
            ..Default::default()
        }
    }

    pub fn overviews_for(&self, table: &str) -> Option<&BTreeMap<u8, OverviewTier>> {
        self.overviews.get(table).filter(|tiers| !tiers.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewTier {
    pub table: String,
}

impl OverviewTier {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

/// Spatial filter descriptor reapplied against overview tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBoxFilterDefinition {
    #[serde(rename = "type")]
    pub kind: FilterType,
    pub options: BBoxFilterOptions,
    pub params: BBoxFilterParams,
}

impl BBoxFilterDefinition {
    /// Descriptor on the projected geometry column at SRID 3857.
    pub fn webmercator(bbox: impl Into<String>) -> Self {
        Self {
            kind: FilterType::Bbox,
            options: BBoxFilterOptions {
                column: WEBMERCATOR_COLUMN.to_string(),
                srid: WEBMERCATOR_SRID,
            },
            params: BBoxFilterParams { bbox: bbox.into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBoxFilterOptions {
    pub column: String,
    pub srid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBoxFilterParams {
    pub bbox: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overview_keys_parse_as_zoom_levels() {
        let data: QueryRewriteData = serde_json::from_value(json!({
            "overviews": {
                "populated_places": {
                    "0": { "table": "_vovw_0_populated_places" },
                    "4": { "table": "_vovw_4_populated_places" }
                }
            }
        }))
        .unwrap();
        let tiers = data.overviews_for("populated_places").unwrap();
        assert_eq!(tiers.keys().copied().collect::<Vec<_>>(), vec![0, 4]);
        assert_eq!(tiers[&4].table, "_vovw_4_populated_places");
        assert!(data.overviews_for("other").is_none());
    }

    #[test]
    fn test_webmercator_bbox_descriptor() {
        let def = BBoxFilterDefinition::webmercator("0,0,10,10");
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "bbox",
                "options": { "column": "the_geom_webmercator", "srid": 3857 },
                "params": { "bbox": "0,0,10,10" }
            })
        );
    }
}
