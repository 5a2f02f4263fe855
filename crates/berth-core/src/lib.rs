//! Live train describer state for the berth occupancy service.
//!
//! This crate owns the area/berth/signal model and everything that touches
//! it: applying feed messages, scheduled housekeeping, and building the
//! snapshots served to clients.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `berth-config.yaml` into
//!   strongly-typed structs.
//! - [`context`] -- [`AppContext`], the explicit application context.
//! - [`store`] -- [`StateStore`], the mutex-guarded area/berth/signal graph.
//! - [`dispatcher`] -- [`MessageDispatcher`], batch decoding and routing.
//! - [`reaper`] -- [`Reaper`]: TTL sweep, daily reset, size gauges.
//! - [`query`] -- [`QueryService`], read-only response snapshots.
//!
//! # Locking
//!
//! The store and the statistics engine each have one mutex. The store may
//! call into the statistics engine while holding its lock; never the other
//! way round.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod query;
pub mod reaper;
pub mod store;

pub use context::AppContext;
pub use dispatcher::{DispatchError, DispatchReport, MessageDispatcher, decode_batch};
pub use query::{AreaOut, AreasOut, CacheHint, Cached, QueryService};
pub use reaper::{BerthCounts, Reaper, SweepReport};
pub use store::{Area, Berth, FeedState, StateStore};
