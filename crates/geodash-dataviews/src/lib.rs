//! Dataview query compilation for geodash.
//!
//! A dataview summarises the data behind a map layer: a histogram, a category
//! breakdown or a single formula value. This crate turns a dataview definition
//! and the request parameters into one SQL statement, with cross-filters,
//! bounding boxes, overview tables and pre-aggregated sources folded in.

pub mod backend;
pub mod datasource;
pub mod dataview;
pub mod db;
pub mod filter;
pub mod overviews;
pub mod params;
pub mod provider;
pub mod rewrite_data;
pub mod settings;

pub use backend::{CompiledDataview, DataviewBackend};
pub use datasource::{
    Datasource, Manifest, PreAggregatedDatasource, PreAggregatedDataview, PreAggregatedMatcher,
    SqlDatasource, SupportsRampAggregation,
};
pub use dataview::{
    Aggregates, Dataview, DataviewFactory, DataviewOutput, DataviewStrategy, Operation,
    OverviewsDataview, OverviewsDataviewFactory, PlainDataview, PlainDataviewFactory, get_factory,
};
pub use db::{QueryRunner, Row};
pub use filter::{BBox, BBoxFilter, CategoryFilter, Filter, RangeFilter};
pub use overviews::{OverviewQuery, OverviewsQueryRewriter, ZoomLevel};
pub use params::{FilterMode, OverrideParams, RequestParams};
pub use provider::{MapConfigProvider, StaticMapConfigProvider};
pub use rewrite_data::resolve_query_rewrite_data;
pub use settings::DataviewSettings;
