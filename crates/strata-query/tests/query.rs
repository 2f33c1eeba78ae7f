//! Query service scenarios over a synced catalog and a scripted remote.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde_json::json;

use strata_catalog::{CubeId, RegistryId};
use strata_core::{Error, RequestContext};
use strata_query::{QueryRequest, QueryService, TIMESTAMP};
use strata_remote::{CubeDocument, RemoteSchema};
use strata_sync::SyncEngine;
use strata_test_utils::{
    Failure, RemoteOp, TestContext, init_test_logging, keyword_stats_document, query_response,
    supply_stats_document,
};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn query_start() -> NaiveDateTime {
    at(2017, 8, 10, 0)
}

fn service(ctx: &TestContext) -> QueryService {
    QueryService::new(
        Arc::clone(&ctx.catalog),
        Arc::clone(&ctx.remote) as Arc<dyn RemoteSchema>,
        ctx.config.clone(),
    )
}

async fn synced(ctx: &TestContext) -> RegistryId {
    let registry = ctx.add_registry("prod");
    ctx.remote.serve_cube("prod", "keyword_stats", keyword_stats_document());
    ctx.remote.serve_cube("prod", "supply_stats", supply_stats_document());
    let engine = SyncEngine::new(
        Arc::clone(&ctx.catalog),
        Arc::clone(&ctx.remote) as Arc<dyn RemoteSchema>,
        ctx.config.clone(),
    );
    let report = engine.refresh_registry(registry).await.unwrap();
    assert!(report.is_complete());
    registry
}

fn keyword_stats(ctx: &TestContext, registry: RegistryId) -> CubeId {
    ctx.cube_id(registry, "keyword_stats").expect("keyword_stats synced")
}

fn clicks_request(granularity: &str, from: NaiveDateTime, to: NaiveDateTime) -> QueryRequest {
    let mut request = QueryRequest::new(granularity, from, to);
    request.metrics = vec!["Clicks".into()];
    request
}

fn caller() -> RequestContext {
    RequestContext::with_request_id("rid-query", "analyst")
}

#[tokio::test]
async fn daily_query_runs_and_gains_timestamp() {
    init_test_logging();
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let cube = keyword_stats(&ctx, registry);
    ctx.remote.set_response(
        "prod",
        query_response(
            &["Day", "Advertiser ID", "Clicks"],
            vec![
                vec![json!("2017-08-06"), json!(11), json!(40)],
                vec![json!("2017-08-07"), json!(11), json!(12)],
            ],
        ),
    );

    let mut request = clicks_request("1 day", at(2017, 8, 6, 0), at(2017, 8, 7, 0));
    request.groupby = vec!["Advertiser ID".into()];
    let result = service(&ctx)
        .run_at(&caller(), cube, &request, query_start())
        .await
        .unwrap();

    assert_eq!(result.request_id, "rid-query");
    assert_eq!(
        result.result_set.columns,
        vec!["Day", "Advertiser ID", "Clicks", TIMESTAMP]
    );
    assert_eq!(result.result_set.rows[1][3], json!("2017-08-07"));
    assert!(result.query.starts_with(r#"{"cube":"keyword_stats""#));

    let executed: Vec<_> = ctx
        .remote
        .operations()
        .into_iter()
        .filter_map(|op| match op {
            RemoteOp::Execute {
                cube_version,
                query,
                request_id,
                ..
            } => Some((cube_version, query, request_id)),
            _ => None,
        })
        .collect();
    assert_eq!(executed.len(), 1);
    let (cube_version, query, request_id) = &executed[0];
    assert_eq!(*cube_version, 0);
    assert_eq!(request_id, "rid-query");
    assert_eq!(
        query.select_field_names().collect::<Vec<_>>(),
        vec!["Day", "Advertiser ID", "Clicks"]
    );
}

#[tokio::test]
async fn field_injection_follows_granularity() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let cube = keyword_stats(&ctx, registry);
    let service = service(&ctx);
    let (from, to) = (at(2017, 8, 6, 0), at(2017, 8, 7, 0));

    let fields = |granularity: &str| {
        let compiled = service
            .compile(cube, &clicks_request(granularity, from, to), query_start())
            .unwrap();
        compiled
            .document
            .select_field_names()
            .map(str::to_string)
            .collect::<Vec<_>>()
    };

    assert!(fields("1 day").contains(&"Day".to_string()));
    let hourly = fields("1 hour");
    assert!(hourly.contains(&"Day".to_string()) && hourly.contains(&"Hour".to_string()));
    let all = fields("all");
    assert!(!all.contains(&"Day".to_string()) && !all.contains(&"Hour".to_string()));
}

#[tokio::test]
async fn hourly_lookback_violation_never_reaches_remote() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let cube = keyword_stats(&ctx, registry);

    let request = clicks_request("1 hour", at(2017, 7, 20, 0), at(2017, 7, 21, 0));
    let err = service(&ctx)
        .run_at(&caller(), cube, &request, query_start())
        .await
        .unwrap_err();

    assert!(err.is_range_violation());
    assert_eq!(
        err.to_string(),
        "Earliest date available: 2017-07-28. You selected 2017-07-20 to 2017-07-21"
    );
    assert!(ctx.remote.executed_queries().is_empty());
}

#[tokio::test]
async fn hourly_window_comes_from_cube_policy() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let cube = keyword_stats(&ctx, registry);
    let service = service(&ctx);

    let from = at(2017, 8, 1, 0);
    let err = service
        .compile(cube, &clicks_request("1 hour", from, from + TimeDelta::days(8)), query_start())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Maximum allowed time span: 7 days. You selected 8 days"
    );

    // the daily row allows far wider spans
    assert!(
        service
            .compile(cube, &clicks_request("1 day", from, from + TimeDelta::days(8)), query_start())
            .is_ok()
    );
}

#[tokio::test]
async fn missing_lookback_falls_back_to_configured_default() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let cube = ctx.cube_id(registry, "supply_stats").unwrap();
    let service = service(&ctx);

    let mut request = QueryRequest::new("1 hour", at(2017, 7, 12, 0), at(2017, 7, 13, 0));
    request.metrics = vec!["Ad Requests".into()];
    assert!(service.compile(cube, &request, query_start()).is_ok());

    request.from = at(2017, 7, 9, 0);
    let err = service.compile(cube, &request, query_start()).unwrap_err();
    assert!(err.to_string().starts_with("Earliest date available: 2017-07-12."));
}

#[tokio::test]
async fn empty_result_is_no_data() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let cube = keyword_stats(&ctx, registry);
    ctx.remote
        .set_response("prod", query_response(&["Day", "Clicks"], vec![]));

    let request = clicks_request("1 day", at(2017, 8, 6, 0), at(2017, 8, 7, 0));
    let err = service(&ctx)
        .run_at(&caller(), cube, &request, query_start())
        .await
        .unwrap_err();
    assert!(err.is_no_data());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn remote_outage_is_retryable() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let cube = keyword_stats(&ctx, registry);
    ctx.remote.fail_execute("prod", Failure::Unavailable);

    let request = clicks_request("all", at(2017, 8, 6, 0), at(2017, 8, 7, 0));
    let err = service(&ctx)
        .run_at(&caller(), cube, &request, query_start())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("prod"));
}

#[tokio::test]
async fn hourly_results_get_synthesized_timestamps() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let cube = keyword_stats(&ctx, registry);
    ctx.remote.set_response(
        "prod",
        query_response(
            &["Hour", "Day", "Clicks"],
            vec![
                vec![json!("3"), json!("2017-08-06"), json!(1)],
                vec![json!("4"), json!("2017-08-06"), json!(2)],
            ],
        ),
    );

    let request = clicks_request("1 hour", at(2017, 8, 6, 3), at(2017, 8, 6, 5));
    let result = service(&ctx)
        .run_at(&caller(), cube, &request, query_start())
        .await
        .unwrap();
    assert_eq!(result.result_set.columns, vec!["Hour", "Clicks", TIMESTAMP]);
    assert_eq!(result.result_set.rows[0][2], json!("2017-08-06 03:00:00"));
}

#[tokio::test]
async fn passthrough_cubes_keep_raw_hours() {
    let mut ctx = TestContext::new();
    ctx.config.hour_passthrough_cubes = vec!["keyword_stats".into()];
    let registry = synced(&ctx).await;
    let cube = keyword_stats(&ctx, registry);
    ctx.remote.set_response(
        "prod",
        query_response(
            &["Hour", "Day", "Clicks"],
            vec![vec![json!("3"), json!("2017-08-06"), json!(1)]],
        ),
    );

    let request = clicks_request("1 hour", at(2017, 8, 6, 3), at(2017, 8, 6, 5));
    let result = service(&ctx)
        .run_at(&caller(), cube, &request, query_start())
        .await
        .unwrap();
    assert_eq!(result.result_set.columns, vec!["Hour", "Day", "Clicks"]);
}

#[tokio::test]
async fn null_hour_in_result_is_invalid_data() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let cube = keyword_stats(&ctx, registry);
    ctx.remote.set_response(
        "prod",
        query_response(
            &["Hour", "Day", "Clicks"],
            vec![vec![serde_json::Value::Null, json!("2017-08-06"), json!(1)]],
        ),
    );

    let request = clicks_request("1 hour", at(2017, 8, 6, 3), at(2017, 8, 6, 5));
    let err = service(&ctx)
        .run_at(&caller(), cube, &request, query_start())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteDataInvalid { .. }));
}

#[tokio::test]
async fn unknown_cube_is_not_found() {
    let ctx = TestContext::new();
    synced(&ctx).await;
    let request = clicks_request("all", at(2017, 8, 6, 0), at(2017, 8, 7, 0));
    let err = service(&ctx)
        .compile(CubeId::new(999), &request, query_start())
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

// ============================================================================
// Cube probe
// ============================================================================

#[tokio::test]
async fn cube_probe_reports_ok_and_queries_first_metric() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    ctx.remote
        .set_response("prod", query_response(&["Day", "Impressions"], vec![]));

    let status = service(&ctx)
        .cube_status(&caller(), registry, "keyword_stats")
        .await
        .unwrap();
    assert_eq!(status, "OK");

    let queries = ctx.remote.executed_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(
        queries[0].select_field_names().collect::<Vec<_>>(),
        vec!["Day", "Impressions"]
    );
}

#[tokio::test]
async fn cube_probe_rejects_misshapen_rows() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    ctx.remote.set_response(
        "prod",
        query_response(&["Day", "Impressions"], vec![vec![json!("2017-08-08")]]),
    );

    let status = service(&ctx)
        .cube_status(&caller(), registry, "keyword_stats")
        .await
        .unwrap();
    assert!(status.starts_with("Exception when requesting cube prod.keyword_stats: "));
    assert!(status.contains("row 0 has 1 values"));
}

#[tokio::test]
async fn hourly_cube_probe_rejects_null_hours() {
    let ctx = TestContext::new();
    let registry = ctx.add_registry("prod");
    let document: CubeDocument = serde_json::from_value(json!({
        "name": "hourly_stats",
        "mainEntityIds": {},
        "maxDaysLookBack": [{"requestType": "SyncRequest", "grain": "HourlyGrain", "days": 14}],
        "maxDaysWindow": [{"requestType": "SyncRequest", "grain": "HourlyGrain", "days": 7}],
        "fields": [
            {"field": "Hour", "type": "Dimension", "dataType": {"type": "String"}, "filterable": 1},
            {"field": "Day", "type": "Dimension", "dataType": {"type": "Date"}, "filterable": 1},
            {"field": "Clicks", "type": "Fact", "dataType": {"type": "Integer"}, "filterable": 1}
        ]
    }))
    .unwrap();
    ctx.remote.serve_cube("prod", "hourly_stats", document);
    let engine = SyncEngine::new(
        Arc::clone(&ctx.catalog),
        Arc::clone(&ctx.remote) as Arc<dyn RemoteSchema>,
        ctx.config.clone(),
    );
    assert!(engine.refresh_registry(registry).await.unwrap().is_complete());
    ctx.remote.set_response(
        "prod",
        query_response(
            &["Hour", "Day", "Clicks"],
            vec![vec![serde_json::Value::Null, json!("2017-08-08"), json!(2)]],
        ),
    );

    let status = service(&ctx)
        .cube_status(&caller(), registry, "hourly_stats")
        .await
        .unwrap();
    assert!(status.starts_with("Exception when requesting cube prod.hourly_stats: "));
    assert!(status.contains("NULL value in Hour"));
    assert_eq!(
        ctx.remote.executed_queries()[0]
            .select_field_names()
            .collect::<Vec<_>>(),
        vec!["Hour", "Day", "Clicks"]
    );
}

#[tokio::test]
async fn cube_probe_describes_failures() {
    let ctx = TestContext::new();
    let registry = synced(&ctx).await;
    let service = service(&ctx);

    let status = service.cube_status(&caller(), registry, "no_such_cube").await.unwrap();
    assert_eq!(status, "Cube 'no_such_cube' not found");

    ctx.remote
        .fail_cube("prod", "keyword_stats", Failure::InvalidData);
    let status = service.cube_status(&caller(), registry, "keyword_stats").await.unwrap();
    assert_eq!(status, "No data from cube: prod.keyword_stats");

    ctx.remote.heal();
    ctx.remote.withdraw_cube("prod", "keyword_stats");
    let status = service.cube_status(&caller(), registry, "keyword_stats").await.unwrap();
    assert_eq!(
        status,
        "Request failed: 404, HTTP 404 Not Found: cube 'keyword_stats'"
    );

    ctx.remote.fail_execute("prod", Failure::Unavailable);
    let status = service.cube_status(&caller(), registry, "supply_stats").await.unwrap();
    assert!(status.starts_with("Exception when requesting cube prod.supply_stats: "));
}

#[tokio::test]
async fn cube_probe_of_unknown_registry_is_not_found() {
    let ctx = TestContext::new();
    let err = service(&ctx)
        .cube_status(&caller(), RegistryId::new(42), "keyword_stats")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
