//! The statistics table.
//!
//! [`StatisticsEngine`] owns every [`Series`] behind one
//! [`tokio::sync::Mutex`]. Callers only ever get copies out.
//!
//! Lock ordering: the feed store may call into the engine while holding its
//! own lock (store lock, then statistics lock). The engine never calls back
//! into the store, so the reverse order cannot arise.

use std::collections::BTreeMap;

use berth_types::SharedClock;
use tokio::sync::Mutex;
use tracing::info;

use crate::statistic::{Series, Statistic, StatisticSnapshot};

/// A period aggregate captured by [`StatisticsEngine::tick`] before reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedStatistic {
    /// Statistic key, e.g. `feed.latency.all`.
    pub key: String,
    /// The aggregate for the period that just closed.
    pub aggregate: Statistic,
}

/// Thread-safe table of named statistics.
#[derive(Debug)]
pub struct StatisticsEngine {
    clock: SharedClock,
    log_ticks: bool,
    series: Mutex<BTreeMap<String, Series>>,
}

impl StatisticsEngine {
    /// Create an empty engine reading time from `clock`.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            log_ticks: false,
            series: Mutex::new(BTreeMap::new()),
        }
    }

    /// Log one line per sampled statistic on every tick.
    #[must_use]
    pub fn with_tick_logging(mut self, enabled: bool) -> Self {
        self.log_ticks = enabled;
        self
    }

    /// Replace the value of `key`, creating the statistic if needed.
    pub async fn set(&self, key: &str, value: i64) {
        let now = self.clock.now_unix();
        let mut table = self.series.lock().await;
        Self::entry(&mut table, key, now).current.set(value, now);
    }

    /// Add `delta` to the value of `key`, creating the statistic if needed.
    pub async fn incr(&self, key: &str, delta: i64) {
        let now = self.clock.now_unix();
        let mut table = self.series.lock().await;
        Self::entry(&mut table, key, now).current.incr(delta, now);
    }

    /// Shorthand for `incr(key, 1)`.
    pub async fn incr_one(&self, key: &str) {
        self.incr(key, 1).await;
    }

    /// Shorthand for `incr(key, -1)`.
    pub async fn decr(&self, key: &str) {
        self.incr(key, -1).await;
    }

    /// Copy of one statistic with its history, or `None` if never created.
    pub async fn get(&self, key: &str) -> Option<StatisticSnapshot> {
        let table = self.series.lock().await;
        table.get(key).map(Series::snapshot)
    }

    /// Copies of every statistic, keyed by name.
    pub async fn get_all(&self) -> BTreeMap<String, StatisticSnapshot> {
        let table = self.series.lock().await;
        table
            .iter()
            .map(|(key, series)| (key.clone(), series.snapshot()))
            .collect()
    }

    /// Close the current period for every key.
    ///
    /// Each aggregate is pushed into the history buffer (idle keys included,
    /// so history points stay evenly spaced) and then reset. The closed
    /// aggregates are returned for forwarding to a metrics sink.
    pub async fn tick(&self) -> Vec<CollectedStatistic> {
        let now = self.clock.now_unix();
        let mut table = self.series.lock().await;
        table
            .iter_mut()
            .map(|(key, series)| {
                let aggregate = series.roll(now);
                if self.log_ticks && aggregate.has_samples() {
                    info!(
                        key = key.as_str(),
                        value = aggregate.value,
                        count = aggregate.count,
                        min = aggregate.min,
                        max = aggregate.max,
                        sum = aggregate.sum,
                        average = aggregate.average,
                        "statistic"
                    );
                }
                CollectedStatistic {
                    key: key.clone(),
                    aggregate,
                }
            })
            .collect()
    }

    fn entry<'a>(table: &'a mut BTreeMap<String, Series>, key: &str, now: i64) -> &'a mut Series {
        table
            .entry(key.to_owned())
            .or_insert_with(|| Series::new(now))
    }
}
