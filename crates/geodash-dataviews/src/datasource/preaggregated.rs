//! Pre-aggregated (`tt_`) datasources.
//!
//! Tables following the `tt_<name>` convention are served by stored
//! procedures that filter and aggregate inside the database. The adapter
//! builds a manifest of the filters active on sibling dataviews and emits
//! procedure calls instead of plain SQL.

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

use geodash_core::{
    DataviewDefinition, DataviewError, DataviewType, FilterDefinition, FilterParams, FilterType,
    MapConfig, RequestFilters, Result,
};

use super::Datasource;
use crate::dataview::{Aggregation, Dataview, DataviewOutput, DataviewStrategy, Histogram};
use crate::db::{QueryRunner, fetch};
use crate::filter::BBoxFilter;
use crate::params::OverrideParams;
use crate::settings::DataviewSettings;

pub const PRE_AGGREGATED_TYPE: &str = "tt";

/// Recognizes pre-aggregated tables in datasource queries.
#[derive(Debug, Clone)]
pub struct PreAggregatedMatcher {
    name: Regex,
}

impl PreAggregatedMatcher {
    pub fn new() -> Result<Self> {
        let name = Regex::new(r"(?i)tt_(.*)$")
            .map_err(|e| DataviewError::configuration(format!("invalid table pattern: {e}")))?;
        Ok(Self { name })
    }

    /// Table name after the `tt_` prefix, if the query follows the convention.
    pub fn table_name(&self, query: &str) -> Option<String> {
        let captures = self.name.captures(query)?;
        let table = captures.get(1)?.as_str().trim();
        (!table.is_empty()).then(|| table.to_string())
    }
}

/// A sibling dataview's active filter, annotated with its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFilter {
    pub dataview: String,
    pub kind: FilterType,
    pub column: String,
    pub params: FilterParams,
}

impl ManifestFilter {
    /// JSON object handed to the procedures, without the owner annotation.
    pub fn procedure_json(&self) -> Value {
        let mut object = self.params.clone();
        object.insert("type".into(), Value::from(self.kind.as_str()));
        object.insert("column".into(), Value::from(self.column.as_str()));
        Value::Object(object)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestAggregation {
    pub aggregate_function: String,
    pub aggregate_column: String,
}

impl ManifestAggregation {
    pub fn new(function: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            aggregate_function: function.into(),
            aggregate_column: column.into(),
        }
    }

    /// Result column produced by the tile procedure.
    pub fn column_name(&self) -> String {
        if self.aggregate_function == "count" {
            "count_vals".to_string()
        } else {
            format!("{}_{}", self.aggregate_function, self.aggregate_column)
        }
    }

    pub fn procedure_json(&self) -> Value {
        json!({
            "type": "numeric",
            "aggregate_function": self.aggregate_function,
            "aggregate_column": self.aggregate_column,
        })
    }
}

/// Per-request description of what the procedures must filter and aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub table: String,
    pub filters: Vec<ManifestFilter>,
    pub aggregations: Vec<ManifestAggregation>,
}

impl Manifest {
    /// Collect the active request filters of every dataview on `source_id`.
    pub fn build(
        table: impl Into<String>,
        source_id: &str,
        map_config: &MapConfig,
        request_filters: &RequestFilters,
    ) -> Self {
        let filters = map_config
            .dataviews_for_source(source_id)
            .filter_map(|(name, definition)| {
                let params = request_filters.get(name)?;
                let kind = definition.kind.filter_type()?;
                Some(ManifestFilter {
                    dataview: name.to_string(),
                    kind,
                    column: definition.column().to_string(),
                    params: params.clone(),
                })
            })
            .collect();

        Self {
            table: table.into(),
            filters,
            aggregations: vec![ManifestAggregation::new("count", "1")],
        }
    }

    pub fn kind(&self) -> &'static str {
        PRE_AGGREGATED_TYPE
    }

    /// Copy of the manifest carrying `function(column)`; unchanged if already present.
    pub fn with_aggregation(&self, function: &str, column: &str) -> Self {
        let mut manifest = self.clone();
        let exists = manifest
            .aggregations
            .iter()
            .any(|a| a.aggregate_function == function && a.aggregate_column == column);
        if !exists {
            manifest
                .aggregations
                .push(ManifestAggregation::new(function, column));
        }
        manifest
    }

    /// Filters applying to `dataview`: its own one only when `own_filter` is set.
    pub fn filters_for<'a>(
        &'a self,
        dataview: &'a str,
        own_filter: bool,
    ) -> impl Iterator<Item = &'a ManifestFilter> + 'a {
        self.filters
            .iter()
            .filter(move |filter| own_filter || filter.dataview != dataview)
    }
}

/// Quote a JSON value as a SQL string literal.
fn pg_json(value: &Value) -> String {
    format!("'{}'", value.to_string().replace('\'', "''"))
}

fn pg_json_list<'a>(values: impl Iterator<Item = Value> + 'a) -> String {
    values.map(|v| pg_json(&v)).collect::<Vec<_>>().join(",")
}

fn sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Capability of datasources that can carry extra aggregations for a color ramp.
pub trait SupportsRampAggregation: Sized {
    /// Register `function(column)`. Registering the same pair twice is a no-op.
    fn with_aggregation(&self, function: &str, column: &str) -> Self;

    /// Register the `avg(column)` aggregation a ramp over `column` needs.
    fn with_ramp_aggregation(&self, column: &str) -> Self {
        self.with_aggregation("avg", column)
    }
}

/// Datasource adapter over a `tt_` table.
#[derive(Debug, Clone)]
pub struct PreAggregatedDatasource {
    inner: Arc<dyn Datasource>,
    manifest: Manifest,
}

impl PreAggregatedDatasource {
    pub fn new(
        inner: Arc<dyn Datasource>,
        table: impl Into<String>,
        map_config: &MapConfig,
        request_filters: &RequestFilters,
    ) -> Self {
        let manifest = Manifest::build(table, inner.id(), map_config, request_filters);
        debug!(
            source = inner.id(),
            table = %manifest.table,
            filters = manifest.filters.len(),
            "pre-aggregated manifest built"
        );
        Self { inner, manifest }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Strategy calling the procedures for `definition`, `None` for dataview
    /// kinds the procedures do not serve.
    pub fn dataview_strategy(
        &self,
        name: &str,
        definition: &DataviewDefinition,
        bbox: Option<&str>,
        settings: &DataviewSettings,
    ) -> Result<Option<PreAggregatedDataview>> {
        let call = match definition.kind {
            DataviewType::Histogram => {
                ProcedureCall::Histogram(Histogram::new(&definition.options, settings.max_bins)?)
            }
            DataviewType::Aggregation | DataviewType::Category => {
                ProcedureCall::Aggregation(Aggregation::new(
                    definition.kind,
                    &definition.options,
                    settings.default_categories,
                    settings.search_limit,
                )?)
            }
            DataviewType::Formula => return Ok(None),
        };

        let bbox = match bbox {
            Some(raw) => BBoxFilter::webmercator(raw)?
                .bboxes()
                .first()
                .map(|bbox| bbox.to_webmercator()),
            None => None,
        };

        Ok(Some(PreAggregatedDataview {
            name: name.to_string(),
            manifest: self.manifest.clone(),
            bbox,
            call,
        }))
    }
}

impl Datasource for PreAggregatedDatasource {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn get_query(&self) -> String {
        let manifest = &self.manifest;
        let filters = pg_json_list(manifest.filters.iter().map(ManifestFilter::procedure_json));
        let aggregations = pg_json_list(
            manifest
                .aggregations
                .iter()
                .map(ManifestAggregation::procedure_json),
        );
        let mut columns = vec![
            "cartodb_id int".to_string(),
            "the_geom_webmercator geometry".to_string(),
        ];
        columns.extend(
            manifest
                .aggregations
                .iter()
                .map(|a| format!("{} numeric", a.column_name())),
        );

        format!(
            "SELECT * FROM TT_TileData(\n  '{}',\n  '@bbox'::json,\n  ARRAY[{filters}]::json[],\n  ARRAY[{aggregations}]::json[],\n  @zoom\n) AS tiledata (\n  {}\n)",
            sql_string(&manifest.table),
            columns.join(",\n  ")
        )
    }

    fn get_metadata(&self) -> Option<&Manifest> {
        Some(&self.manifest)
    }

    fn get_filters(&self) -> IndexMap<String, FilterDefinition> {
        IndexMap::new()
    }

    fn get_type(&self) -> &'static str {
        PRE_AGGREGATED_TYPE
    }
}

impl SupportsRampAggregation for PreAggregatedDatasource {
    fn with_aggregation(&self, function: &str, column: &str) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            manifest: self.manifest.with_aggregation(function, column),
        }
    }
}

#[derive(Debug, Clone)]
enum ProcedureCall {
    Histogram(Histogram),
    Aggregation(Aggregation),
}

impl ProcedureCall {
    fn procedure(&self) -> &'static str {
        match self {
            Self::Histogram(_) => "TT_Histogram",
            Self::Aggregation(_) => "TT_Aggregation",
        }
    }

    fn parameters(&self, overrides: &OverrideParams) -> Result<Value> {
        let mut params = Map::new();
        match self {
            Self::Histogram(histogram) => {
                params.insert("column".into(), Value::from(histogram.column()));
                params.insert("bins".into(), Value::from(histogram.bins(overrides)?));
                if let Some(start) = overrides.start {
                    params.insert("start".into(), Value::from(start));
                }
                if let Some(end) = overrides.end {
                    params.insert("end".into(), Value::from(end));
                }
            }
            Self::Aggregation(aggregation) => {
                let (operation, column) = aggregation.operation(overrides)?;
                params.insert("column".into(), Value::from(aggregation.column()));
                params.insert("aggregation".into(), Value::from(operation.as_str()));
                if operation != crate::dataview::Operation::Count {
                    params.insert("aggregationColumn".into(), Value::from(column));
                }
            }
        }
        Ok(Value::Object(params))
    }

    fn dataview(&self) -> &dyn Dataview {
        match self {
            Self::Histogram(histogram) => histogram,
            Self::Aggregation(aggregation) => aggregation,
        }
    }
}

/// Dataview answered by a pre-aggregation procedure.
#[derive(Debug, Clone)]
pub struct PreAggregatedDataview {
    name: String,
    manifest: Manifest,
    bbox: Option<[f64; 4]>,
    call: ProcedureCall,
}

impl PreAggregatedDataview {
    /// Procedure call for this dataview. Sibling filters always apply; its own
    /// filter only with `own_filter`, and none at all with `no_filters`.
    pub fn sql(&self, overrides: &OverrideParams) -> Result<String> {
        let filters = if overrides.no_filters {
            String::new()
        } else {
            pg_json_list(
                self.manifest
                    .filters_for(&self.name, overrides.own_filter)
                    .map(ManifestFilter::procedure_json),
            )
        };
        let bbox = match self.bbox {
            Some(bbox) => pg_json(&json!(bbox)),
            None => "NULL".to_string(),
        };
        let parameters = pg_json(&self.call.parameters(overrides)?);

        Ok(format!(
            "SELECT * FROM {}(\n  '{}',\n  {bbox}::json,\n  ARRAY[{filters}]::json[],\n  {parameters}::json,\n  0\n) as dataview",
            self.call.procedure(),
            sql_string(&self.manifest.table)
        ))
    }
}

#[async_trait]
impl DataviewStrategy for PreAggregatedDataview {
    async fn get_result(
        &self,
        db: &dyn QueryRunner,
        overrides: &OverrideParams,
    ) -> Result<DataviewOutput> {
        let sql = self.sql(overrides)?;
        let rows = fetch(db, &sql).await?;
        let result = self.call.dataview().format(&rows, overrides)?;
        Ok(DataviewOutput::new(result).with_stat("pre_aggregated", self.manifest.table.as_str()))
    }

    async fn search(&self, _db: &dyn QueryRunner, _text: &str) -> Result<Value> {
        Err(DataviewError::invalid_option(
            "Search is not available on pre-aggregated datasources",
        ))
    }
}
