//! Read-only snapshots served to clients.
//!
//! Every response is built from copies taken under the store lock, so it
//! stays stable after the lock is released. Each carries a [`CacheHint`]
//! that the transport turns into `Cache-Control` and `Last-Modified`.

use std::collections::BTreeMap;
use std::sync::Arc;

use berth_stats::{StatisticView, StatisticsEngine};
use serde::{Deserialize, Serialize};

use crate::store::{Berth, LATENCY_ALL_KEY, StateStore, area_latency_key};

/// How long clients may cache the area list.
pub const AREAS_MAX_AGE_SECONDS: u32 = 60;

/// How long clients may cache one area's detail.
pub const AREA_MAX_AGE_SECONDS: u32 = 10;

/// Caching policy attached to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHint {
    /// `max-age` / `s-maxage` in seconds.
    pub max_age_seconds: u32,
    /// Unix seconds to advertise as last modified; `None` when unknown.
    pub last_modified: Option<i64>,
}

impl CacheHint {
    fn new(max_age_seconds: u32, timestamp: i64) -> Self {
        Self {
            max_age_seconds,
            last_modified: (timestamp > 0).then_some(timestamp),
        }
    }
}

/// A response body with its caching policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    /// The body.
    pub body: T,
    /// Caching policy.
    pub cache: CacheHint,
}

/// Body of the area list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreasOut {
    /// Area ids, sorted.
    pub areas: Vec<String>,
    /// Unix seconds of the last message from any area.
    pub last_update: i64,
    /// Unix seconds of the last full reset.
    pub reset: i64,
    /// Number of areas.
    pub total: usize,
    /// Number of berths across all areas, occupied or not.
    pub berths: usize,
    /// Feed-wide latency statistic.
    pub latency: Option<StatisticView>,
}

/// Body of one area's detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaOut {
    /// Area id as requested.
    pub name: String,
    /// Occupied berths only.
    pub berths: BTreeMap<String, Berth>,
    /// Every signal address with its raw data.
    pub signals: BTreeMap<String, String>,
    /// Unix seconds of the area's last message; 0 if never seen.
    pub last_update: i64,
    /// Last heartbeat token.
    pub heart_beat: String,
    /// Number of occupied berths.
    pub occupied: usize,
    /// Number of berths, occupied or not.
    pub total: usize,
    /// Latency statistic for this area.
    pub latency: Option<StatisticView>,
}

impl AreaOut {
    /// `false` for an area that has never been updated; the transport
    /// reports this as not found.
    pub const fn is_known(&self) -> bool {
        self.last_update != 0
    }
}

/// Builds response snapshots from the store and the statistics engine.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: Arc<StateStore>,
    stats: Arc<StatisticsEngine>,
}

impl QueryService {
    /// Create a query service.
    pub const fn new(store: Arc<StateStore>, stats: Arc<StatisticsEngine>) -> Self {
        Self { store, stats }
    }

    /// Snapshot of every area name plus global counters.
    pub async fn list_areas(&self) -> Cached<AreasOut> {
        let mut body = self
            .store
            .read(|state| AreasOut {
                areas: state.areas().keys().cloned().collect(),
                last_update: state.last_update(),
                reset: state.last_reset(),
                total: state.areas().len(),
                berths: state.areas().values().map(|a| a.berths().len()).sum(),
                latency: None,
            })
            .await;
        body.latency = self.latency(LATENCY_ALL_KEY).await;

        let cache = CacheHint::new(AREAS_MAX_AGE_SECONDS, body.last_update);
        Cached { body, cache }
    }

    /// Snapshot of one area. Vacant berths are left out.
    pub async fn get_area(&self, area_id: &str) -> Cached<AreaOut> {
        let mut body = self
            .store
            .read(|state| {
                let mut out = AreaOut {
                    name: area_id.to_owned(),
                    ..AreaOut::default()
                };
                if let Some(area) = state.area(area_id) {
                    out.last_update = area.timestamp();
                    area.heartbeat().clone_into(&mut out.heart_beat);
                    out.berths = area
                        .berths()
                        .iter()
                        .filter(|(_, berth)| berth.is_occupied())
                        .map(|(id, berth)| (id.clone(), berth.clone()))
                        .collect();
                    out.signals = area.signals().clone();
                    out.total = area.berths().len();
                }
                out.occupied = out.berths.len();
                out
            })
            .await;

        if body.is_known() {
            body.latency = self.latency(&area_latency_key(area_id)).await;
        }

        let cache = CacheHint::new(AREA_MAX_AGE_SECONDS, body.last_update);
        Cached { body, cache }
    }

    /// Every statistic with its history.
    pub async fn statistics(&self) -> BTreeMap<String, StatisticView> {
        self.stats
            .get_all()
            .await
            .iter()
            .map(|(key, snapshot)| (key.clone(), StatisticView::from(snapshot)))
            .collect()
    }

    async fn latency(&self, key: &str) -> Option<StatisticView> {
        self.stats
            .get(key)
            .await
            .map(|snapshot| StatisticView::from(&snapshot))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use berth_types::{FeedTime, ManualClock};

    use super::*;
    use crate::reaper::Reaper;

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        clock: Arc<ManualClock>,
        stats: Arc<StatisticsEngine>,
        store: Arc<StateStore>,
        reaper: Reaper,
        query: QueryService,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(NOW));
        let stats = Arc::new(StatisticsEngine::new(clock.clone()));
        let store = Arc::new(StateStore::new(clock.clone(), Arc::clone(&stats)));
        Fixture {
            reaper: Reaper::new(clock.clone(), Arc::clone(&store), Arc::clone(&stats)),
            query: QueryService::new(Arc::clone(&store), Arc::clone(&stats)),
            clock,
            stats,
            store,
        }
    }

    fn at(seconds: i64) -> FeedTime {
        FeedTime::from_millis(seconds * 1000)
    }

    #[tokio::test]
    async fn list_areas_is_sorted_and_counts_all_berths() {
        let f = fixture();
        f.store.apply_interpose(&at(NOW - 3), "WY", "1", "1A01").await;
        f.store.apply_cancel(&at(NOW - 2), "AB", "7").await;
        f.store.apply_interpose(&at(NOW - 1), "AB", "8", "2B02").await;

        let out = f.query.list_areas().await;
        assert_eq!(out.body.areas, ["AB", "WY"]);
        assert_eq!(out.body.total, 2);
        assert_eq!(out.body.berths, 3);
        assert_eq!(out.body.last_update, NOW - 1);
        assert_eq!(out.cache.max_age_seconds, AREAS_MAX_AGE_SECONDS);
        assert_eq!(out.cache.last_modified, Some(NOW - 1));

        let latency = out.body.latency.unwrap();
        assert_eq!(latency.value, 1);
        assert_eq!(latency.count, 3);
    }

    #[tokio::test]
    async fn get_area_hides_vacant_berths() {
        let f = fixture();
        f.store.apply_interpose(&at(NOW - 5), "WY", "1", "1A01").await;
        f.store.apply_transfer(&at(NOW - 4), "WY", "1", "2", "1A01").await;
        f.store.apply_signal(&at(NOW - 4), "WY", "0A", "FF").await;
        f.store.apply_heartbeat(&at(NOW - 4), "WY", "2359").await;

        let out = f.query.get_area("WY").await;
        assert!(out.body.is_known());
        assert_eq!(out.body.berths.len(), 1);
        assert_eq!(out.body.berths["2"].descr, "1A01");
        assert_eq!(out.body.occupied, 1);
        assert_eq!(out.body.total, 2);
        assert_eq!(out.body.signals["0A"], "FF");
        assert_eq!(out.body.heart_beat, "2359");
        assert_eq!(out.cache.max_age_seconds, AREA_MAX_AGE_SECONDS);
        assert_eq!(out.body.latency.unwrap().value, 4);
    }

    #[tokio::test]
    async fn unknown_area_is_reported_unknown() {
        let f = fixture();
        let out = f.query.get_area("NEVER_SEEN").await;
        assert_eq!(out.body.last_update, 0);
        assert!(!out.body.is_known());
        assert!(out.body.latency.is_none());
        assert_eq!(out.cache.last_modified, None);
    }

    #[tokio::test]
    async fn reset_is_visible_in_area_list() {
        let f = fixture();
        f.store.apply_interpose(&at(NOW), "WY", "1", "1A01").await;
        f.clock.advance(7);
        let reset_at = f.reaper.full_reset().await;

        let out = f.query.list_areas().await;
        assert!(out.body.areas.is_empty());
        assert_eq!(out.body.total, 0);
        assert_eq!(out.body.berths, 0);
        assert_eq!(out.body.reset, reset_at);
        assert_eq!(out.body.reset, NOW + 7);
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_store() {
        let f = fixture();
        f.store.apply_interpose(&at(NOW), "WY", "1", "1A01").await;
        let before = f.query.get_area("WY").await;
        f.store.apply_cancel(&at(NOW), "WY", "1").await;

        assert_eq!(before.body.berths["1"].descr, "1A01");
        assert!(f.query.get_area("WY").await.body.berths.is_empty());
    }

    #[tokio::test]
    async fn latency_survives_statistics_tick() {
        let f = fixture();
        f.store.apply_interpose(&at(NOW - 3), "WY", "1", "1A01").await;
        f.clock.advance(60);
        f.stats.tick().await;

        let areas = f.query.list_areas().await.body.latency.unwrap();
        assert_eq!(areas.count, 1);
        assert_eq!(areas.value, 3);
        assert_eq!(areas.min, Some(3));
        assert_eq!(areas.max, Some(3));

        let area = f.query.get_area("WY").await.body.latency.unwrap();
        assert_eq!(area.count, 1);
        assert_eq!(area.value, 3);

        let stats = f.query.statistics().await;
        assert_eq!(stats[LATENCY_ALL_KEY].count, 1);
    }

    #[tokio::test]
    async fn latency_scenario_three_seconds_behind() {
        let f = fixture();
        let event_millis = 1_699_999_997_000;
        f.clock.set(event_millis / 1000 + 3);
        f.store
            .apply_heartbeat(&FeedTime::from_millis(event_millis), "AB", "0001")
            .await;

        let stats = f.query.statistics().await;
        assert_eq!(stats[LATENCY_ALL_KEY].value, 3);
    }
}
