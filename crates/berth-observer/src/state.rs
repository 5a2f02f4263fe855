//! Shared application state for the query API.

use berth_core::QueryService;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Snapshot builder over the live store and statistics.
    pub query: QueryService,
    /// Whether `GET /stats` is served.
    pub stats_endpoint: bool,
}

impl AppState {
    /// Create application state with the statistics endpoint enabled.
    pub const fn new(query: QueryService) -> Self {
        Self {
            query,
            stats_endpoint: true,
        }
    }

    /// Enable or disable `GET /stats`.
    #[must_use]
    pub fn with_stats_endpoint(mut self, enabled: bool) -> Self {
        self.stats_endpoint = enabled;
        self
    }
}
