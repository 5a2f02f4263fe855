//! REST API endpoint handlers for the query server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/areas`, `/area` | Sorted area list, counters, feed latency |
//! | `GET` | `/area/{id}`, `/{id}` | One area's occupied berths and signals |
//! | `GET` | `/stats` | Every statistic with history |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use berth_core::{CacheHint, Cached};
use chrono::DateTime;
use serde::Serialize;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /areas -- area list
// ---------------------------------------------------------------------------

/// List every known area with global counters.
pub async fn list_areas(State(state): State<Arc<AppState>>) -> Response {
    cached_json(state.query.list_areas().await)
}

// ---------------------------------------------------------------------------
// GET /area/{id} -- single area
// ---------------------------------------------------------------------------

/// Occupied berths, signals and heartbeat for one area.
///
/// Returns 404 if the area has never been updated.
pub async fn get_area(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ObserverError> {
    let area = state.query.get_area(&id).await;
    if !area.body.is_known() {
        return Err(ObserverError::NotFound(format!("area {id} not found")));
    }
    Ok(cached_json(area))
}

// ---------------------------------------------------------------------------
// GET /stats -- statistics dump
// ---------------------------------------------------------------------------

/// Every statistic with its compacted history.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    if !state.stats_endpoint {
        return Err(ObserverError::NotFound(String::from(
            "statistics endpoint disabled",
        )));
    }
    let stats = state.query.statistics().await;
    Ok(Json(serde_json::to_value(stats)?))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serialize `cached.body` with its caching headers.
fn cached_json<T: Serialize>(cached: Cached<T>) -> Response {
    (cache_headers(cached.cache), Json(cached.body)).into_response()
}

/// `Cache-Control` plus `Last-Modified` when the snapshot has a timestamp.
pub fn cache_headers(hint: CacheHint) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let max_age = hint.max_age_seconds;
    if let Ok(value) = HeaderValue::from_str(&format!("max-age={max_age}, s-maxage={max_age}")) {
        headers.insert(CACHE_CONTROL, value);
    }
    if let Some(value) = hint
        .last_modified
        .and_then(http_date)
        .and_then(|date| HeaderValue::from_str(&date).ok())
    {
        headers.insert(LAST_MODIFIED, value);
    }
    headers
}

/// Format Unix seconds as an RFC 7231 HTTP-date.
pub fn http_date(unix_seconds: i64) -> Option<String> {
    DateTime::from_timestamp(unix_seconds, 0)
        .map(|t| t.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}
