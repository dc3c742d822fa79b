use geodash_core::{DataviewDefinition, QueryRewriteData, Result};

use super::{DataviewStrategy, OverviewsDataview, PlainDataview, build};
use crate::overviews::{OverviewsQueryRewriter, ZoomLevel, zoom_for_bbox};
use crate::settings::DataviewSettings;

/// Builds the strategy answering a dataview over a compiled base query.
pub trait DataviewFactory: Send + Sync {
    fn get_dataview(
        &self,
        name: &str,
        query: String,
        definition: &DataviewDefinition,
    ) -> Result<Box<dyn DataviewStrategy>>;
}

/// Factory that never looks at overview metadata.
#[derive(Debug, Clone, Copy)]
pub struct PlainDataviewFactory<'a> {
    settings: &'a DataviewSettings,
}

impl<'a> PlainDataviewFactory<'a> {
    pub fn new(settings: &'a DataviewSettings) -> Self {
        Self { settings }
    }
}

impl DataviewFactory for PlainDataviewFactory<'_> {
    fn get_dataview(
        &self,
        _name: &str,
        query: String,
        definition: &DataviewDefinition,
    ) -> Result<Box<dyn DataviewStrategy>> {
        let dataview = build(definition, self.settings)?;
        Ok(Box::new(PlainDataview::new(query, dataview)))
    }
}

/// Factory producing strategies that may read from overview tables.
#[derive(Debug, Clone)]
pub struct OverviewsDataviewFactory<'a> {
    settings: &'a DataviewSettings,
    rewriter: &'a OverviewsQueryRewriter,
    rewrite_data: QueryRewriteData,
    zoom: ZoomLevel,
}

impl<'a> OverviewsDataviewFactory<'a> {
    /// The zoom is derived from the request bbox; without one nothing is rewritten.
    pub fn new(
        settings: &'a DataviewSettings,
        rewriter: &'a OverviewsQueryRewriter,
        rewrite_data: QueryRewriteData,
        bbox: Option<&str>,
    ) -> Result<Self> {
        let zoom = ZoomLevel::from_zoom(zoom_for_bbox(bbox, settings.tile_size)?);
        Ok(Self {
            settings,
            rewriter,
            rewrite_data,
            zoom,
        })
    }
}

impl DataviewFactory for OverviewsDataviewFactory<'_> {
    fn get_dataview(
        &self,
        name: &str,
        query: String,
        definition: &DataviewDefinition,
    ) -> Result<Box<dyn DataviewStrategy>> {
        let dataview = build(definition, self.settings)?;
        Ok(Box::new(OverviewsDataview::new(
            name,
            query,
            dataview,
            self.rewriter.clone(),
            self.rewrite_data.clone(),
            self.zoom.clone(),
        )))
    }
}

/// Overview-aware factory when rewrite data exists, plain factory otherwise.
pub fn get_factory<'a>(
    settings: &'a DataviewSettings,
    rewriter: &'a OverviewsQueryRewriter,
    rewrite_data: Option<QueryRewriteData>,
    bbox: Option<&str>,
) -> Result<Box<dyn DataviewFactory + 'a>> {
    let factory: Box<dyn DataviewFactory + 'a> = match rewrite_data {
        Some(data) => Box::new(OverviewsDataviewFactory::new(settings, rewriter, data, bbox)?),
        None => Box::new(PlainDataviewFactory::new(settings)),
    };
    Ok(factory)
}
