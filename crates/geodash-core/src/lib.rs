pub mod dataview;
pub mod error;
pub mod filters;
pub mod mapconfig;
pub mod rewrite;

pub use dataview::{ColumnType, DataviewDefinition, DataviewOptions, DataviewSql, DataviewType, NodeRef};
pub use error::{DataviewError, ErrorBody, ErrorKind, Result};
pub use filters::{FilterDefinition, FilterParams, FilterType, RequestFilters};
pub use mapconfig::{Layer, LayerOptions, MapConfig, SourceRef};
pub use rewrite::{BBoxFilterDefinition, OverviewTier, QueryRewriteData};
