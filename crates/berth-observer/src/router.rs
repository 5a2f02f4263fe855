//! Axum router construction for the query API.
//!
//! Assembles every route into a single [`Router`] with CORS middleware
//! enabled so browser dashboards can poll the service directly.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the query server.
///
/// The router includes:
/// - `GET /areas` -- area list
/// - `GET /area/{id}` -- single area
/// - `GET /stats` -- statistics dump
/// - `GET /area` and `GET /{id}` -- legacy aliases of the first two
///
/// The fixed paths are registered ahead of the `/{id}` catch-all, and
/// axum prefers static segments, so `/areas` and `/stats` are never read
/// as area ids.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/areas", get(handlers::list_areas))
        .route("/area/{id}", get(handlers::get_area))
        .route("/stats", get(handlers::get_stats))
        // Legacy
        .route("/area", get(handlers::list_areas))
        .route("/{id}", get(handlers::get_area))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
