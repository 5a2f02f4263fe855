//! Query API server for the berth occupancy service.
//!
//! This crate provides an Axum HTTP server that exposes read-only JSON
//! views of the live train describer state:
//!
//! - **`GET /areas`** (legacy `/area`) -- sorted area list with global
//!   counters and feed latency
//! - **`GET /area/{id}`** (legacy `/{id}`) -- occupied berths, signals and
//!   heartbeat for one area; `404` if the area has never been updated
//! - **`GET /stats`** -- every statistic with its history (optional)
//!
//! # Architecture
//!
//! Handlers call into [`QueryService`], which copies what it needs out of
//! the store under its lock and releases it before the response is
//! serialized. Responses carry `Cache-Control` and `Last-Modified`
//! headers derived from the snapshot.
//!
//! [`QueryService`]: berth_core::QueryService

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind_listener, serve, start_server};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
