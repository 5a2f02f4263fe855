//! Integration tests for the query API endpoints.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The store is filled through the real dispatcher
//! with a manual clock so timestamps and latencies are exact.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, LAST_MODIFIED};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use berth_core::AppContext;
use berth_core::config::StatisticsConfig;
use berth_observer::router::build_router;
use berth_observer::state::AppState;
use berth_types::{ManualClock, SharedClock};
use serde_json::Value;
use tower::ServiceExt;

const NOW: i64 = 1_700_000_000;

const BATCH: &[u8] = br#"[
    {"CC_MSG": {"time": "1699999990000", "area_id": "WY", "to": "0101", "descr": "1A01"}},
    {
        "CA_MSG": {"time": "1699999995000", "area_id": "WY", "from": "0101", "to": "0103", "descr": "1A01"},
        "SF_MSG": {"time": "1699999995000", "area_id": "WY", "msg_type": "SF", "address": "12", "data": "0F"}
    },
    {"CT_MSG": {"time": "1699999995000", "area_id": "AB", "report_time": "1659"}}
]"#;

async fn make_test_context() -> AppContext {
    let clock: SharedClock = Arc::new(ManualClock::new(NOW));
    let ctx = AppContext::new(clock, &StatisticsConfig::default());
    ctx.dispatcher().dispatch_payload(BATCH).await.unwrap();
    ctx
}

async fn make_router(stats_endpoint: bool) -> Router {
    let ctx = make_test_context().await;
    let state = AppState::new(ctx.query()).with_stats_endpoint(stats_endpoint);
    build_router(Arc::new(state))
}

async fn get(router: Router, path: &str) -> Response {
    router
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header<'a>(response: &'a Response, name: &axum::http::HeaderName) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .map(|value| value.to_str().unwrap())
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_list_areas() {
    let response = get(make_router(true).await, "/areas").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, &CACHE_CONTROL),
        Some("max-age=60, s-maxage=60")
    );
    assert_eq!(
        header(&response, &LAST_MODIFIED),
        Some("Tue, 14 Nov 2023 22:13:15 GMT")
    );

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["areas"], serde_json::json!(["AB", "WY"]));
    assert_eq!(json["total"], 2);
    assert_eq!(json["berths"], 2);
    assert_eq!(json["lastUpdate"], 1_699_999_995);
    assert_eq!(json["latency"]["count"], 4);
    assert_eq!(json["latency"]["value"], 5);
}

#[tokio::test]
async fn test_legacy_area_list_matches() {
    let current = get(make_router(true).await, "/areas").await;
    let legacy = get(make_router(true).await, "/area").await;

    assert_eq!(legacy.status(), StatusCode::OK);
    assert_eq!(
        body_to_json(legacy.into_body()).await,
        body_to_json(current.into_body()).await
    );
}

#[tokio::test]
async fn test_get_area() {
    let response = get(make_router(true).await, "/area/WY").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, &CACHE_CONTROL),
        Some("max-age=10, s-maxage=10")
    );
    assert_eq!(
        header(&response, &LAST_MODIFIED),
        Some("Tue, 14 Nov 2023 22:13:15 GMT")
    );

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["name"], "WY");
    assert_eq!(json["occupied"], 1);
    assert_eq!(json["total"], 2);
    assert_eq!(json["berths"]["0103"]["descr"], "1A01");
    assert!(json["berths"].get("0101").is_none());
    assert_eq!(json["signals"]["12"], "0F");
    assert_eq!(json["latency"]["count"], 3);
}

#[tokio::test]
async fn test_get_area_heartbeat_only() {
    let response = get(make_router(true).await, "/area/AB").await;
    let json = body_to_json(response.into_body()).await;

    assert_eq!(json["heartBeat"], "1659");
    assert_eq!(json["berths"], serde_json::json!({}));
    assert_eq!(json["occupied"], 0);
}

#[tokio::test]
async fn test_legacy_area_path() {
    let response = get(make_router(true).await, "/WY").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["name"], "WY");
    assert_eq!(json["occupied"], 1);
}

#[tokio::test]
async fn test_get_area_not_found() {
    let response = get(make_router(true).await, "/area/NEVER_SEEN").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(header(&response, &CACHE_CONTROL).is_none());
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_legacy_area_not_found() {
    let response = get(make_router(true).await, "/XX").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_store_has_no_last_modified() {
    let clock: SharedClock = Arc::new(ManualClock::new(NOW));
    let ctx = AppContext::new(clock, &StatisticsConfig::default());
    let router = build_router(Arc::new(AppState::new(ctx.query())));

    let response = get(router, "/areas").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, &LAST_MODIFIED).is_none());
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total"], 0);
    assert!(json["latency"].is_null());
}

#[tokio::test]
async fn test_stats_endpoint() {
    let response = get(make_router(true).await, "/stats").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["feed.latency.all"]["value"], 5);
    assert_eq!(json["feed.latency.all"]["min"], 5);
    assert_eq!(json["feed.latency.all"]["max"], 10);
    assert_eq!(json["feed.latency.WY"]["count"], 3);
}

#[tokio::test]
async fn test_stats_endpoint_disabled() {
    let response = get(make_router(false).await, "/stats").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
