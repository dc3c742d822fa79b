use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use geodash_core::{QueryRewriteData, Result};

use super::{Aggregates, Dataview};
use crate::db::{QueryRunner, fetch};
use crate::overviews::{FilterScope, OverviewsQueryRewriter, ZoomLevel};
use crate::params::OverrideParams;

/// Dataview result plus strategy-defined execution stats (empty by default).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataviewOutput {
    pub result: Value,
    pub stats: Map<String, Value>,
}

impl DataviewOutput {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            stats: Map::new(),
        }
    }

    pub fn with_stat(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.stats.insert(key.to_string(), value.into());
        self
    }
}

/// A dataview bound to its base query.
#[async_trait]
pub trait DataviewStrategy: Send + Sync {
    /// Compute the dataview result with one database round trip.
    async fn get_result(
        &self,
        db: &dyn QueryRunner,
        overrides: &OverrideParams,
    ) -> Result<DataviewOutput>;

    /// Search categories by text. Only category breakdowns support it.
    async fn search(&self, db: &dyn QueryRunner, text: &str) -> Result<Value>;
}

/// Runs the dataview directly over its base query.
#[derive(Debug)]
pub struct PlainDataview {
    query: String,
    dataview: Box<dyn Dataview>,
}

impl PlainDataview {
    pub fn new(query: impl Into<String>, dataview: Box<dyn Dataview>) -> Self {
        Self {
            query: query.into(),
            dataview,
        }
    }
}

#[async_trait]
impl DataviewStrategy for PlainDataview {
    async fn get_result(
        &self,
        db: &dyn QueryRunner,
        overrides: &OverrideParams,
    ) -> Result<DataviewOutput> {
        let sql = self.dataview.sql(&self.query, Aggregates::Raw, overrides)?;
        let rows = fetch(db, &sql).await?;
        Ok(DataviewOutput::new(self.dataview.format(&rows, overrides)?))
    }

    async fn search(&self, db: &dyn QueryRunner, text: &str) -> Result<Value> {
        let sql = self.dataview.search_sql(&self.query, text)?;
        let rows = fetch(db, &sql).await?;
        self.dataview.format_search(&rows)
    }
}

/// Runs the dataview over an overview table when the zoom allows it.
#[derive(Debug)]
pub struct OverviewsDataview {
    name: String,
    query: String,
    dataview: Box<dyn Dataview>,
    rewriter: OverviewsQueryRewriter,
    rewrite_data: QueryRewriteData,
    zoom: ZoomLevel,
}

impl OverviewsDataview {
    pub fn new(
        name: impl Into<String>,
        query: impl Into<String>,
        dataview: Box<dyn Dataview>,
        rewriter: OverviewsQueryRewriter,
        rewrite_data: QueryRewriteData,
        zoom: ZoomLevel,
    ) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            dataview,
            rewriter,
            rewrite_data,
            zoom,
        }
    }
}

#[async_trait]
impl DataviewStrategy for OverviewsDataview {
    async fn get_result(
        &self,
        db: &dyn QueryRunner,
        overrides: &OverrideParams,
    ) -> Result<DataviewOutput> {
        let scope = FilterScope {
            dataview: &self.name,
            own_filter: overrides.own_filter,
            no_filters: overrides.no_filters,
        };
        let rewritten =
            self.rewriter
                .rewrite(&self.query, Some(&self.rewrite_data), &self.zoom, scope)?;
        let aggregates = if rewritten.is_rewritten() {
            Aggregates::Weighted
        } else {
            Aggregates::Raw
        };
        debug!(
            dataview = %self.name,
            overview_table = rewritten.overview_table.as_deref().unwrap_or(""),
            "compiling overview-aware dataview"
        );

        let sql = self.dataview.sql(&rewritten.sql, aggregates, overrides)?;
        let rows = fetch(db, &sql).await?;
        let output = DataviewOutput::new(self.dataview.format(&rows, overrides)?);
        Ok(match rewritten.overview_table {
            Some(table) => output.with_stat("overviews", table),
            None => output,
        })
    }

    async fn search(&self, db: &dyn QueryRunner, text: &str) -> Result<Value> {
        let sql = self.dataview.search_sql(&self.query, text)?;
        let rows = fetch(db, &sql).await?;
        self.dataview.format_search(&rows)
    }
}
