//! Request entry points: compile a dataview request into one strategy and run it.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use geodash_core::{DataviewDefinition, DataviewError, MapConfig, Result};

use crate::datasource::{Datasource, PreAggregatedDatasource, PreAggregatedMatcher, SqlDatasource};
use crate::dataview::{DataviewFactory, DataviewOutput, DataviewStrategy, PlainDataviewFactory, get_factory};
use crate::db::QueryRunner;
use crate::filter::BBoxFilter;
use crate::overviews::OverviewsQueryRewriter;
use crate::params::{OverrideParams, RequestParams};
use crate::provider::MapConfigProvider;
use crate::rewrite_data::resolve_query_rewrite_data;
use crate::settings::DataviewSettings;

/// A compiled dataview request, ready to run.
pub struct CompiledDataview {
    pub strategy: Box<dyn DataviewStrategy>,
    pub overrides: OverrideParams,
}

#[derive(Debug, Clone)]
pub struct DataviewBackend {
    settings: DataviewSettings,
    rewriter: OverviewsQueryRewriter,
    preaggregated: PreAggregatedMatcher,
}

impl DataviewBackend {
    pub fn new(settings: DataviewSettings) -> Result<Self> {
        Ok(Self {
            rewriter: OverviewsQueryRewriter::new(settings.zoom_level_expr.clone()),
            preaggregated: PreAggregatedMatcher::new()?,
            settings,
        })
    }

    pub fn settings(&self) -> &DataviewSettings {
        &self.settings
    }

    /// Compute a dataview result.
    #[instrument(skip(self, provider, db, params))]
    pub async fn get_dataview(
        &self,
        provider: &dyn MapConfigProvider,
        db: &dyn QueryRunner,
        name: &str,
        params: &RequestParams,
    ) -> Result<DataviewOutput> {
        let map_config = provider.get_map_config().await?;
        let compiled = self.compile(&map_config, name, params)?;
        compiled.strategy.get_result(db, &compiled.overrides).await
    }

    /// Validate the request and pick the strategy, without touching the database.
    pub fn compile(
        &self,
        map_config: &MapConfig,
        name: &str,
        params: &RequestParams,
    ) -> Result<CompiledDataview> {
        let definition = dataview_definition(map_config, name)?;
        params.validate_filter_flags()?;
        let overrides = params.override_params()?;

        let mode = params.filter_mode();
        let mut query = mode.select(&definition.sql).to_string();
        let bbox = params.bbox();
        if let Some(bbox) = bbox {
            query = BBoxFilter::webmercator(bbox)?.sql(&query);
        }

        debug!(
            dataview = name,
            kind = %definition.kind,
            filter_mode = mode.as_str(),
            bbox = bbox.unwrap_or(""),
            "compiling dataview"
        );

        if let Some(strategy) = self.pre_aggregated(map_config, name, definition, params)? {
            return Ok(CompiledDataview {
                strategy,
                overrides,
            });
        }

        let rewrite_data = resolve_query_rewrite_data(map_config, definition, bbox);
        let factory = get_factory(&self.settings, &self.rewriter, rewrite_data, bbox)?;
        let strategy = factory.get_dataview(name, query, definition)?;
        Ok(CompiledDataview {
            strategy,
            overrides,
        })
    }

    /// Strategy backed by pre-aggregation procedures when the source follows
    /// the `tt_` convention and the dataview kind is served by them.
    fn pre_aggregated(
        &self,
        map_config: &MapConfig,
        name: &str,
        definition: &DataviewDefinition,
        params: &RequestParams,
    ) -> Result<Option<Box<dyn DataviewStrategy>>> {
        let Some(datasource) = map_config
            .source_layer(&definition.source.id)
            .and_then(SqlDatasource::from_layer)
        else {
            return Ok(None);
        };
        let Some(table) = self.preaggregated.table_name(&datasource.get_query()) else {
            return Ok(None);
        };

        let request_filters = params.request_filters()?;
        let adapter =
            PreAggregatedDatasource::new(Arc::new(datasource), table, map_config, &request_filters);
        let strategy = adapter.dataview_strategy(name, definition, params.bbox(), &self.settings)?;
        if strategy.is_none() {
            debug!(dataview = name, "dataview kind not served by pre-aggregation, using plain path");
        }
        Ok(strategy.map(|s| Box::new(s) as Box<dyn DataviewStrategy>))
    }

    /// Search a category dataview.
    #[instrument(skip(self, provider, db, params))]
    pub async fn search(
        &self,
        provider: &dyn MapConfigProvider,
        db: &dyn QueryRunner,
        name: &str,
        params: &RequestParams,
    ) -> Result<Value> {
        let map_config = provider.get_map_config().await?;
        let definition = dataview_definition(&map_config, name)?;

        let mut query = if params.own_filter() {
            definition.sql.own_filter_on.clone()
        } else {
            definition.sql.own_filter_off.clone()
        };
        if let Some(bbox) = params.bbox() {
            query = BBoxFilter::geographic(bbox)?.sql(&query);
        }

        let strategy = PlainDataviewFactory::new(&self.settings).get_dataview(name, query, definition)?;
        let text = params.q.as_deref().unwrap_or_default();
        debug!(dataview = name, text, "searching dataview");
        strategy.search(db, text).await
    }
}

fn dataview_definition<'a>(map_config: &'a MapConfig, name: &str) -> Result<&'a DataviewDefinition> {
    map_config
        .dataview(name)
        .ok_or_else(|| DataviewError::unknown_dataview(name))
}
