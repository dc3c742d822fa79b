//! Overview table substitution.
//!
//! Overview tables are coarser, pre-aggregated copies of a base table. Each
//! overview row stands for `_feature_count` base features, so queries running
//! against them must weight their aggregates (see [`crate::dataview::Aggregates`]).

mod zoom;

pub use zoom::{scale_for_bbox, zoom_for_bbox, zoom_from_scale};

use regex::Regex;
use tracing::debug;

use geodash_core::{DataviewError, OverviewTier, QueryRewriteData, Result};

use crate::filter::{BBoxFilter, Filter, validate_identifier};
use crate::settings::DEFAULT_ZOOM_LEVEL_EXPR;

/// How the zoom level of a query is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoomLevel {
    /// No scale is known; nothing is rewritten
    Undefined,
    /// Zoom computed up front (dataview requests)
    Fixed(i32),
    /// SQL expression evaluated by the database (tile requests)
    Expression(String),
}

impl ZoomLevel {
    pub fn from_zoom(zoom: Option<i32>) -> Self {
        zoom.map_or(Self::Undefined, Self::Fixed)
    }
}

/// Which node filters are reapplied on top of an overview table.
#[derive(Debug, Clone, Copy)]
pub struct FilterScope<'a> {
    /// Dataview whose own filter is skipped unless `own_filter` is set
    pub dataview: &'a str,
    pub own_filter: bool,
    pub no_filters: bool,
}

impl FilterScope<'_> {
    fn includes(&self, filter_owner: &str) -> bool {
        !self.no_filters && (self.own_filter || filter_owner != self.dataview)
    }
}

/// Result of a rewrite attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewQuery {
    pub sql: String,
    /// Overview table that replaced the base table, `None` when unchanged
    pub overview_table: Option<String>,
}

impl OverviewQuery {
    fn unchanged(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            overview_table: None,
        }
    }

    pub fn is_rewritten(&self) -> bool {
        self.overview_table.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct OverviewsQueryRewriter {
    zoom_level_expr: String,
}

impl Default for OverviewsQueryRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_ZOOM_LEVEL_EXPR)
    }
}

impl OverviewsQueryRewriter {
    pub fn new(zoom_level_expr: impl Into<String>) -> Self {
        Self {
            zoom_level_expr: zoom_level_expr.into(),
        }
    }

    /// Zoom expression for the tile path: the data's own expression, else the default.
    pub fn zoom_level_expression(&self, data: &QueryRewriteData) -> ZoomLevel {
        ZoomLevel::Expression(
            data.zoom_level
                .clone()
                .unwrap_or_else(|| self.zoom_level_expr.clone()),
        )
    }

    /// Rewrite `query` to read from an overview table.
    ///
    /// Falls back to `query` unchanged when there is no rewrite data, no zoom,
    /// or no tier that fits.
    pub fn rewrite(
        &self,
        query: &str,
        data: Option<&QueryRewriteData>,
        zoom: &ZoomLevel,
        scope: FilterScope<'_>,
    ) -> Result<OverviewQuery> {
        let Some(data) = data else {
            return Ok(OverviewQuery::unchanged(query));
        };

        let rewritten = match zoom {
            ZoomLevel::Undefined => None,
            ZoomLevel::Fixed(zoom) => rewrite_for_zoom(data, *zoom, scope)?,
            ZoomLevel::Expression(expr) => rewrite_with_expression(query, data, expr)?,
        };

        Ok(rewritten.unwrap_or_else(|| OverviewQuery::unchanged(query)))
    }
}

/// Extract `<table>` from `SELECT * FROM <table>`.
fn base_table(unfiltered_query: &str) -> Option<&str> {
    let query = unfiltered_query.trim().trim_end_matches(';');
    let mut tokens = query.split_whitespace();
    let select = tokens.next()?;
    let star = tokens.next()?;
    let from = tokens.next()?;
    let table = tokens.next()?;
    let plain = select.eq_ignore_ascii_case("select")
        && star == "*"
        && from.eq_ignore_ascii_case("from")
        && tokens.next().is_none();
    plain.then_some(table)
}

fn tiers_for<'a>(
    data: &'a QueryRewriteData,
    table: &str,
) -> Option<&'a std::collections::BTreeMap<u8, OverviewTier>> {
    data.overviews_for(table).or_else(|| {
        let unqualified = table.rsplit('.').next()?;
        data.overviews_for(unqualified)
    })
}

fn rewrite_for_zoom(
    data: &QueryRewriteData,
    zoom: i32,
    scope: FilterScope<'_>,
) -> Result<Option<OverviewQuery>> {
    let Some(table) = data.unfiltered_query.as_deref().and_then(base_table) else {
        return Ok(None);
    };
    let Some(tiers) = tiers_for(data, table) else {
        return Ok(None);
    };
    let Some((tier_zoom, tier)) = tiers.iter().find(|(z, _)| i32::from(**z) >= zoom) else {
        return Ok(None);
    };

    let overview_table = validate_identifier(&tier.table)?;
    let mut sql = format!("SELECT * FROM {overview_table}");

    if let Some(filters) = &data.filters {
        for (owner, definition) in filters {
            if scope.includes(owner) {
                sql = Filter::from_definition(definition)?.sql(&sql);
            }
        }
    }
    if let Some(bbox_filter) = &data.bbox_filter {
        sql = BBoxFilter::from_definition(bbox_filter)?.sql(&sql);
    }

    debug!(
        table,
        zoom,
        tier_zoom = *tier_zoom,
        overview_table,
        "dataview query rewritten to overview table"
    );

    Ok(Some(OverviewQuery {
        sql,
        overview_table: Some(overview_table.to_string()),
    }))
}

fn rewrite_with_expression(
    query: &str,
    data: &QueryRewriteData,
    zoom_expr: &str,
) -> Result<Option<OverviewQuery>> {
    for (table, tiers) in &data.overviews {
        if tiers.is_empty() {
            continue;
        }
        let pattern = format!(r"(?i)\bFROM\s+{}\b", regex::escape(table));
        let from = Regex::new(&pattern)
            .map_err(|e| DataviewError::configuration(format!("invalid overview table: {e}")))?;
        if !from.is_match(query) {
            continue;
        }

        validate_identifier(table)?;
        let view = format!("_vovw_{}", table.replace(['.', '"'], "_"));

        let mut branches = String::new();
        let mut previous: Option<u8> = None;
        for (zoom, tier) in tiers {
            let tier_table = validate_identifier(&tier.table)?;
            let condition = match previous {
                None => format!("_vovw_z <= {zoom}"),
                Some(prev) => format!("_vovw_z > {prev} AND _vovw_z <= {zoom}"),
            };
            branches.push_str(&format!(
                "    SELECT * FROM {tier_table}, _vovw_scale WHERE {condition}\n    UNION ALL\n"
            ));
            previous = Some(*zoom);
        }
        let deepest = previous.unwrap_or_default();
        let body = from.replace(query, format!("FROM {view}").as_str());

        let sql = format!(
            "WITH
  _vovw_scale AS ( SELECT {zoom_expr} AS _vovw_z ),
  {view} AS (
{branches}    SELECT *, 1 AS _feature_count FROM {table}, _vovw_scale WHERE _vovw_z > {deepest}
  )
{body}"
        );

        return Ok(Some(OverviewQuery {
            sql,
            overview_table: Some(view),
        }));
    }
    Ok(None)
}
