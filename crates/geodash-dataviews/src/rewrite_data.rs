use geodash_core::{BBoxFilterDefinition, DataviewDefinition, MapConfig, QueryRewriteData};

/// Resolve the overview metadata for a dataview.
///
/// Returns `None` when the source layer carries no `query_rewrite_data`, in
/// which case overview rewriting does not apply. Source-node dataviews get
/// their node filters and `own_filter_on` SQL as the unfiltered baseline; a
/// bbox adds a web-mercator `bbox_filter` descriptor.
pub fn resolve_query_rewrite_data(
    map_config: &MapConfig,
    definition: &DataviewDefinition,
    bbox: Option<&str>,
) -> Option<QueryRewriteData> {
    let layer = map_config.source_layer(&definition.source.id)?;
    let mut data = layer.options.query_rewrite_data.clone()?;

    if definition.node.is_source() {
        data.filters = definition.node.filters.clone();
        data.unfiltered_query = Some(definition.sql.own_filter_on.clone());
    }

    if let Some(bbox) = bbox {
        data.bbox_filter = Some(BBoxFilterDefinition::webmercator(bbox));
    }

    Some(data)
}
