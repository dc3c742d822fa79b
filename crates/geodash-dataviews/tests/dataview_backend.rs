mod common;

use serde_json::json;

use common::{
    FailingRunner, RIVERS_NO_FILTERS, RIVERS_OFF, RIVERS_ON, RecordingRunner, dashboard, params,
};
use geodash_core::{DataviewError, ErrorKind};
use geodash_dataviews::{DataviewBackend, DataviewSettings, StaticMapConfigProvider};

fn backend() -> DataviewBackend {
    DataviewBackend::new(DataviewSettings::default()).unwrap()
}

fn provider() -> StaticMapConfigProvider {
    StaticMapConfigProvider::new(dashboard())
}

#[tokio::test]
async fn conflicting_filter_flags_fail_before_any_query() {
    let backend = backend();
    let db = RecordingRunner::new();

    for (own, none) in [("0", "0"), ("1", "1"), ("1", "0"), ("0", "1")] {
        let err = backend
            .get_dataview(
                &provider(),
                &db,
                "length",
                &params(&[("own_filter", own), ("no_filters", none)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DataviewError::ConflictingFilterFlags));
        assert_eq!(err.http_status(), 400);
    }
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn query_variant_precedence() {
    let backend = backend();

    let cases = [
        (vec![("no_filters", "1"), ("own_filter", "one")], RIVERS_NO_FILTERS),
        (vec![("own_filter", "1")], RIVERS_ON),
        (vec![], RIVERS_OFF),
        (vec![("own_filter", "0")], RIVERS_OFF),
    ];
    for (pairs, expected) in cases {
        let db = RecordingRunner::new();
        backend
            .get_dataview(&provider(), &db, "length", &params(&pairs))
            .await
            .unwrap();
        let sql = db.single_statement();
        assert!(
            sql.contains(&format!("FROM ({expected}) __cdb_formula")),
            "{pairs:?} -> {sql}"
        );
    }
}

#[tokio::test]
async fn non_numeric_override_names_the_parameter() {
    let db = RecordingRunner::new();
    let err = backend()
        .get_dataview(&provider(), &db, "pop_max", &params(&[("start", "abc")]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid number format for parameter 'start'");
    assert_eq!(err.kind(), ErrorKind::Dataview);
    assert!(db.statements().is_empty());
}

#[test]
fn numeric_overrides_are_cast() {
    let compiled = backend()
        .compile(&dashboard(), "pop_max", &params(&[("bins", "3.0")]))
        .unwrap();
    assert_eq!(compiled.overrides.bins, Some(3.0));
}

#[tokio::test]
async fn unknown_dataview() {
    let db = RecordingRunner::new();
    let err = backend()
        .get_dataview(&provider(), &db, "nope", &params(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, DataviewError::UnknownDataview(_)));
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn formula_result_is_formatted() {
    let db = RecordingRunner::with_rows(json!([{ "result": 1234.5, "nulls_count": 2 }]));
    let output = backend()
        .get_dataview(&provider(), &db, "length", &params(&[]))
        .await
        .unwrap();

    assert_eq!(
        output.result,
        json!({ "type": "formula", "operation": "sum", "result": 1234.5, "nulls": 2 })
    );
    assert!(output.stats.is_empty());
    assert!(db.single_statement().starts_with("SELECT sum(length) AS result"));
}

#[tokio::test]
async fn bbox_wraps_the_projected_geometry() {
    let db = RecordingRunner::new();
    backend()
        .get_dataview(&provider(), &db, "length", &params(&[("bbox", "0,0,10,10")]))
        .await
        .unwrap();

    let sql = db.single_statement();
    assert!(sql.contains(&format!("SELECT * FROM ({RIVERS_OFF}) _cdb_bbox_filter")));
    assert!(sql.contains(
        "ST_Intersects(the_geom_webmercator, ST_Transform(ST_MakeEnvelope(0,0,10,10, 4326), 3857))"
    ));
}

#[tokio::test]
async fn invalid_bbox_is_rejected() {
    let db = RecordingRunner::new();
    let err = backend()
        .get_dataview(&provider(), &db, "length", &params(&[("bbox", "0,0,10")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dataview);
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn database_errors_surface_unchanged() {
    let err = backend()
        .get_dataview(&provider(), &FailingRunner, "length", &params(&[]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert_eq!(err.http_status(), 500);
    assert!(err.to_string().contains("relation \"rivers\" does not exist"));
}

#[tokio::test]
async fn source_without_rewrite_data_is_not_rewritten() {
    let db = RecordingRunner::new();
    let output = backend()
        .get_dataview(&provider(), &db, "length", &params(&[("bbox", "0,0,10,10")]))
        .await
        .unwrap();
    assert!(output.stats.is_empty());
    assert!(!db.single_statement().contains("_vovw_"));
}

#[tokio::test]
async fn no_bbox_means_no_overview() {
    let db = RecordingRunner::new();
    let output = backend()
        .get_dataview(&provider(), &db, "pop_max", &params(&[]))
        .await
        .unwrap();
    assert!(output.stats.is_empty());
    let sql = db.single_statement();
    assert!(sql.contains("SELECT * FROM populated_places WHERE adm0name IN ('Spain')"));
    assert!(!sql.contains("_feature_count"));
}

#[tokio::test]
async fn overview_table_is_picked_from_the_bbox_zoom() {
    let db = RecordingRunner::new();
    let output = backend()
        .get_dataview(&provider(), &db, "pop_max", &params(&[("bbox", "0,0,10,10")]))
        .await
        .unwrap();

    assert_eq!(output.stats.get("overviews"), Some(&json!("_vovw_8_populated_places")));
    let sql = db.single_statement();
    assert!(sql.contains("SELECT * FROM _vovw_8_populated_places"));
    assert!(sql.contains("sum(_feature_count)"));
    // sibling filter reapplied, own filter skipped
    assert!(sql.contains("adm0name IN ("));
    assert!(!sql.contains("pop_max >= 100000"));
    assert!(sql.contains("ST_Intersects(the_geom_webmercator"));
}

#[tokio::test]
async fn antimeridian_bbox_picks_the_tier_of_its_span() {
    let db = RecordingRunner::new();
    let output = backend()
        .get_dataview(&provider(), &db, "pop_max", &params(&[("bbox", "175,0,-175,10")]))
        .await
        .unwrap();

    assert_eq!(output.stats.get("overviews"), Some(&json!("_vovw_8_populated_places")));
    assert!(db.single_statement().contains(" OR ST_Intersects(the_geom_webmercator"));
}

#[tokio::test]
async fn overview_reapplies_own_filter_when_requested() {
    let db = RecordingRunner::new();
    let output = backend()
        .get_dataview(
            &provider(),
            &db,
            "pop_max",
            &params(&[("bbox", "-180,-85,180,85"), ("own_filter", "1")]),
        )
        .await
        .unwrap();

    assert_eq!(output.stats.get("overviews"), Some(&json!("_vovw_0_populated_places")));
    let sql = db.single_statement();
    assert!(sql.contains("pop_max >= 100000"));
    assert!(sql.contains("adm0name IN ("));
}

#[tokio::test]
async fn overview_own_filter_is_any_non_zero_value() {
    let db = RecordingRunner::new();
    backend()
        .get_dataview(
            &provider(),
            &db,
            "pop_max",
            &params(&[("bbox", "0,0,10,10"), ("own_filter", "2")]),
        )
        .await
        .unwrap();

    let sql = db.single_statement();
    assert!(sql.contains("SELECT * FROM _vovw_8_populated_places"));
    assert!(sql.contains("pop_max >= 100000"));
}

#[tokio::test]
async fn overview_skips_node_filters_with_no_filters() {
    let db = RecordingRunner::new();
    backend()
        .get_dataview(
            &provider(),
            &db,
            "country",
            &params(&[("bbox", "0,0,10,10"), ("no_filters", "1")]),
        )
        .await
        .unwrap();

    let sql = db.single_statement();
    assert!(sql.contains("SELECT * FROM _vovw_8_populated_places"));
    assert!(!sql.contains("_cdb_range_filter"));
    assert!(!sql.contains("_cdb_category_filter"));
}
