mod common;

use serde_json::json;
use std::sync::Arc;

use common::{RIVERS_OFF, RIVERS_ON, RecordingRunner, dashboard, params};
use geodash_core::{ErrorKind, RequestFilters};
use geodash_dataviews::{
    Datasource, DataviewBackend, DataviewSettings, PreAggregatedDatasource, SqlDatasource,
    StaticMapConfigProvider, SupportsRampAggregation,
};

const SALES_FILTERS: &str =
    r#"{"dataviews":{"price":{"min":10,"max":20},"store":{"accept":["Madrid"]}}}"#;

fn backend() -> DataviewBackend {
    DataviewBackend::new(DataviewSettings::default()).unwrap()
}

fn provider() -> StaticMapConfigProvider {
    StaticMapConfigProvider::new(dashboard())
}

#[tokio::test]
async fn sibling_filters_apply_own_filter_does_not() {
    let db = RecordingRunner::with_rows(json!([
        {
            "category": "Madrid", "value": 10, "agg": false, "count": 12, "nulls_count": 0,
            "categories_count": 2, "min_val": 2, "max_val": 10
        },
        {
            "category": "Other", "value": 2, "agg": true, "count": 12, "nulls_count": 0,
            "categories_count": 2, "min_val": 2, "max_val": 10
        }
    ]));
    let output = backend()
        .get_dataview(&provider(), &db, "store", &params(&[("filters", SALES_FILTERS)]))
        .await
        .unwrap();

    let sql = db.single_statement();
    assert!(sql.starts_with("SELECT * FROM TT_Aggregation(\n  'sales',"));
    assert!(sql.contains(r#""max":20"#));
    assert!(!sql.contains(r#""accept":["Madrid"]"#));
    assert!(!sql.contains(r#""dataview""#));

    assert_eq!(output.stats.get("pre_aggregated"), Some(&json!("sales")));
    assert_eq!(output.result["type"], "aggregation");
    assert_eq!(output.result["aggregation"], "count");
    assert_eq!(output.result["count"], 12);
    assert_eq!(output.result["categoriesCount"], 2);
    assert_eq!(
        output.result["categories"],
        json!([
            { "category": "Madrid", "value": 10, "agg": false },
            { "category": "Other", "value": 2, "agg": true }
        ])
    );
}

#[tokio::test]
async fn own_filter_adds_the_dataview_filter() {
    let db = RecordingRunner::new();
    backend()
        .get_dataview(
            &provider(),
            &db,
            "store",
            &params(&[("filters", SALES_FILTERS), ("own_filter", "1")]),
        )
        .await
        .unwrap();

    let sql = db.single_statement();
    assert!(sql.contains(r#""max":20"#));
    assert!(sql.contains(r#""accept":["Madrid"]"#));
}

#[tokio::test]
async fn any_non_zero_own_filter_keeps_the_dataview_filter() {
    let db = RecordingRunner::new();
    backend()
        .get_dataview(
            &provider(),
            &db,
            "store",
            &params(&[("filters", SALES_FILTERS), ("own_filter", "2")]),
        )
        .await
        .unwrap();

    let sql = db.single_statement();
    assert!(sql.contains(r#""accept":["Madrid"]"#));
    assert!(sql.contains(r#""max":20"#));
}

#[tokio::test]
async fn histogram_call_carries_bins_and_projected_bbox() {
    let db = RecordingRunner::new();
    let output = backend()
        .get_dataview(
            &provider(),
            &db,
            "price",
            &params(&[("filters", SALES_FILTERS), ("bins", "4"), ("bbox", "-180,-85,180,85")]),
        )
        .await
        .unwrap();

    let sql = db.single_statement();
    assert!(sql.starts_with("SELECT * FROM TT_Histogram(\n  'sales',\n  '[-20037508.34"));
    assert!(sql.contains(r#""bins":4"#));
    assert!(sql.contains(r#""accept":["Madrid"]"#));
    assert!(!sql.contains(r#""max":20"#));
    assert_eq!(output.stats.get("pre_aggregated"), Some(&json!("sales")));
}

#[tokio::test]
async fn formula_falls_back_to_plain_sql() {
    let db = RecordingRunner::with_rows(json!([{ "result": 7, "nulls_count": 0 }]));
    let output = backend()
        .get_dataview(&provider(), &db, "total", &params(&[("filters", SALES_FILTERS)]))
        .await
        .unwrap();

    let sql = db.single_statement();
    assert!(sql.contains("FROM (select * from tt_sales) __cdb_formula"));
    assert!(output.stats.is_empty());
    assert_eq!(output.result["result"], 7);
}

#[tokio::test]
async fn malformed_filters_are_rejected() {
    let db = RecordingRunner::new();
    let err = backend()
        .get_dataview(&provider(), &db, "store", &params(&[("filters", "{nope")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dataview);
    assert!(db.statements().is_empty());
}

#[test]
fn ramp_registration_is_idempotent() {
    let map_config = dashboard();
    let filters = RequestFilters::from_json(SALES_FILTERS).unwrap();
    let adapter = PreAggregatedDatasource::new(
        Arc::new(SqlDatasource::new("b0", "select * from tt_sales")),
        "sales",
        &map_config,
        &filters,
    );

    let once = adapter.with_aggregation("avg", "price");
    let twice = once.with_aggregation("avg", "price");
    let manifest = twice.get_metadata().unwrap();
    let avg_price = manifest
        .aggregations
        .iter()
        .filter(|a| a.aggregate_function == "avg" && a.aggregate_column == "price")
        .count();
    assert_eq!(avg_price, 1);
    assert_eq!(manifest.aggregations.len(), 2);
    // the original adapter is untouched
    assert_eq!(adapter.manifest().aggregations.len(), 1);

    let query = twice.get_query();
    assert!(query.contains("TT_TileData"));
    assert!(query.contains("avg_price numeric"));
}

#[tokio::test]
async fn search_uses_own_filter_variants() {
    let backend = backend();

    let db = RecordingRunner::with_rows(json!([{ "category": "Amazon", "value": 3 }]));
    let result = backend
        .search(&provider(), &db, "basin", &params(&[("q", "ama")]))
        .await
        .unwrap();
    assert_eq!(
        result,
        json!({ "type": "aggregation", "categories": [{ "category": "Amazon", "value": 3 }] })
    );
    let sql = db.single_statement();
    assert!(sql.contains(&format!("FROM ({RIVERS_OFF}) __cdb_search_src")));
    assert!(sql.contains("ILIKE"));
    assert!(sql.contains("LIMIT 10"));

    let db = RecordingRunner::new();
    backend
        .search(&provider(), &db, "basin", &params(&[("q", "ama"), ("own_filter", "1")]))
        .await
        .unwrap();
    assert!(db.single_statement().contains(&format!("FROM ({RIVERS_ON}) __cdb_search_src")));
}

#[tokio::test]
async fn search_bbox_uses_geographic_geometry() {
    let db = RecordingRunner::new();
    backend()
        .search(&provider(), &db, "basin", &params(&[("q", "a"), ("bbox", "0,0,10,10")]))
        .await
        .unwrap();
    assert!(db.single_statement().contains(
        "ST_Intersects(the_geom, ST_Transform(ST_MakeEnvelope(0,0,10,10, 4326), 4326))"
    ));
}

#[tokio::test]
async fn search_is_only_for_categories() {
    let db = RecordingRunner::new();
    let err = backend()
        .search(&provider(), &db, "length", &params(&[("q", "a")]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Dataview of type 'formula' does not support search");
    assert!(db.statements().is_empty());
}
