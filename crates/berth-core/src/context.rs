//! Explicit application context.
//!
//! Built once at startup and handed to every component that needs the
//! store, the statistics engine or the clock. Cloning is cheap: every
//! member is reference counted.

use std::sync::Arc;

use berth_stats::StatisticsEngine;
use berth_types::SharedClock;

use crate::config::StatisticsConfig;
use crate::dispatcher::MessageDispatcher;
use crate::query::QueryService;
use crate::reaper::Reaper;
use crate::store::StateStore;

/// Shared handles to the live state.
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Time source for every component.
    pub clock: SharedClock,
    /// Statistics table.
    pub stats: Arc<StatisticsEngine>,
    /// Area/berth/signal store.
    pub store: Arc<StateStore>,
}

impl AppContext {
    /// Build a fresh, empty context.
    pub fn new(clock: SharedClock, statistics: &StatisticsConfig) -> Self {
        let stats = Arc::new(
            StatisticsEngine::new(Arc::clone(&clock)).with_tick_logging(statistics.log),
        );
        let store = Arc::new(StateStore::new(Arc::clone(&clock), Arc::clone(&stats)));
        Self {
            clock,
            stats,
            store,
        }
    }

    /// Dispatcher writing into this context's store.
    pub fn dispatcher(&self) -> MessageDispatcher {
        MessageDispatcher::new(Arc::clone(&self.store))
    }

    /// Reaper over this context's store.
    pub fn reaper(&self) -> Reaper {
        Reaper::new(
            Arc::clone(&self.clock),
            Arc::clone(&self.store),
            Arc::clone(&self.stats),
        )
    }

    /// Query service reading this context's store.
    pub fn query(&self) -> QueryService {
        QueryService::new(Arc::clone(&self.store), Arc::clone(&self.stats))
    }
}
