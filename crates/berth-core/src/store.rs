//! The live area/berth/signal model.
//!
//! [`StateStore`] keeps every [`Area`] behind one [`tokio::sync::Mutex`].
//! Each feed operation holds the lock for its whole body, so readers never
//! see a half-applied message. Reads go through [`StateStore::read`], which
//! scopes the guard to a closure; callers copy what they need out of it.
//!
//! Writes are last-write-wins in arrival order. An older event delivered
//! late will move a displayed timestamp backwards; that is a property of the
//! upstream feed and is not corrected here.
//!
//! Lock ordering: store lock, then statistics lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use berth_stats::StatisticsEngine;
use berth_types::{FeedTime, SharedClock};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// Latency statistic covering every area.
pub const LATENCY_ALL_KEY: &str = "feed.latency.all";

/// Latency statistic for one area.
pub fn area_latency_key(area_id: &str) -> String {
    format!("feed.latency.{area_id}")
}

/// A track section that can hold at most one train description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Berth {
    /// Unix seconds of the last change.
    pub timestamp: i64,
    /// Train description; empty when the berth is vacant.
    pub descr: String,
}

impl Berth {
    /// A berth is occupied iff it carries a description.
    pub fn is_occupied(&self) -> bool {
        !self.descr.is_empty()
    }

    fn update(&mut self, timestamp: i64, descr: &str) {
        self.timestamp = timestamp;
        descr.clone_into(&mut self.descr);
    }

    pub(crate) fn vacate(&mut self) {
        self.descr.clear();
    }
}

/// One train describer area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Area {
    timestamp: i64,
    heartbeat: String,
    berths: BTreeMap<String, Berth>,
    signals: BTreeMap<String, String>,
}

impl Area {
    /// Unix seconds of the last message for this area, 0 if none parsed.
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Report time from the last `CT` heartbeat.
    pub fn heartbeat(&self) -> &str {
        &self.heartbeat
    }

    /// Every berth ever seen in the area, occupied or not.
    pub const fn berths(&self) -> &BTreeMap<String, Berth> {
        &self.berths
    }

    /// Raw signalling data keyed by address.
    pub const fn signals(&self) -> &BTreeMap<String, String> {
        &self.signals
    }

    /// Number of berths currently holding a description.
    pub fn occupied_count(&self) -> usize {
        self.berths.values().filter(|b| b.is_occupied()).count()
    }

    fn berth_mut(&mut self, berth_id: &str) -> &mut Berth {
        self.berths.entry(berth_id.to_owned()).or_default()
    }

    pub(crate) fn berths_mut(&mut self) -> impl Iterator<Item = &mut Berth> {
        self.berths.values_mut()
    }
}

/// Everything the store guards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedState {
    timestamp: i64,
    reset: i64,
    areas: BTreeMap<String, Area>,
}

impl FeedState {
    /// Unix seconds of the last message from any area.
    pub const fn last_update(&self) -> i64 {
        self.timestamp
    }

    /// Unix seconds of the last full reset.
    pub const fn last_reset(&self) -> i64 {
        self.reset
    }

    /// All areas keyed by id.
    pub const fn areas(&self) -> &BTreeMap<String, Area> {
        &self.areas
    }

    /// Look up one area.
    pub fn area(&self, area_id: &str) -> Option<&Area> {
        self.areas.get(area_id)
    }

    fn area_mut(&mut self, area_id: &str) -> &mut Area {
        self.areas.entry(area_id.to_owned()).or_default()
    }

    pub(crate) fn areas_mut(&mut self) -> impl Iterator<Item = &mut Area> {
        self.areas.values_mut()
    }

    pub(crate) fn clear(&mut self, now: i64) {
        self.areas.clear();
        self.reset = now;
    }
}

/// Mutex-guarded feed state plus the statistics it reports latency into.
#[derive(Debug)]
pub struct StateStore {
    clock: SharedClock,
    stats: Arc<StatisticsEngine>,
    state: Mutex<FeedState>,
}

impl StateStore {
    /// Create an empty store.
    pub fn new(clock: SharedClock, stats: Arc<StatisticsEngine>) -> Self {
        Self {
            clock,
            stats,
            state: Mutex::new(FeedState::default()),
        }
    }

    /// Run `f` against the state with the lock held and return its result.
    pub async fn read<R>(&self, f: impl FnOnce(&FeedState) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Run `f` against the state with the lock held, allowing mutation.
    pub(crate) async fn write<R>(&self, f: impl FnOnce(&mut FeedState) -> R) -> R {
        let mut state = self.state.lock().await;
        f(&mut state)
    }

    /// `CA`: the train leaves `from` and its description lands in `to`.
    pub async fn apply_transfer(
        &self,
        time: &FeedTime,
        area_id: &str,
        from: &str,
        to: &str,
        descr: &str,
    ) {
        let mut state = self.state.lock().await;
        let at = self.stamp(&mut state, time, area_id).await;
        let area = state.area_mut(area_id);
        area.berth_mut(from).update(at, "");
        area.berth_mut(to).update(at, descr);
    }

    /// `CB`: the description in `berth` is withdrawn.
    pub async fn apply_cancel(&self, time: &FeedTime, area_id: &str, berth: &str) {
        let mut state = self.state.lock().await;
        let at = self.stamp(&mut state, time, area_id).await;
        state.area_mut(area_id).berth_mut(berth).update(at, "");
    }

    /// `CC`: `descr` is placed in `berth` with no recorded origin.
    pub async fn apply_interpose(&self, time: &FeedTime, area_id: &str, berth: &str, descr: &str) {
        let mut state = self.state.lock().await;
        let at = self.stamp(&mut state, time, area_id).await;
        state.area_mut(area_id).berth_mut(berth).update(at, descr);
    }

    /// `CT`: record the area's heartbeat token.
    pub async fn apply_heartbeat(&self, time: &FeedTime, area_id: &str, report_time: &str) {
        let mut state = self.state.lock().await;
        self.stamp(&mut state, time, area_id).await;
        report_time.clone_into(&mut state.area_mut(area_id).heartbeat);
    }

    /// `SF`/`SG`/`SH`: overwrite the raw signal data at `address`.
    pub async fn apply_signal(&self, time: &FeedTime, area_id: &str, address: &str, data: &str) {
        let mut state = self.state.lock().await;
        self.stamp(&mut state, time, area_id).await;
        state
            .area_mut(area_id)
            .signals
            .insert(address.to_owned(), data.to_owned());
    }

    /// Update global and area timestamps and record latency.
    ///
    /// Returns the time to stamp on any berth touched by the message. When
    /// the event time does not parse, timestamps and latency are left alone
    /// and berths are stamped with the local clock instead.
    async fn stamp(&self, state: &mut FeedState, time: &FeedTime, area_id: &str) -> i64 {
        let now = self.clock.now_unix();
        let Some(event) = time.epoch_seconds() else {
            debug!(area = area_id, time = time.as_str(), "unparseable event time");
            state.area_mut(area_id);
            return now;
        };

        state.timestamp = event;
        state.area_mut(area_id).timestamp = event;

        let latency = now.saturating_sub(event);
        self.stats.set(LATENCY_ALL_KEY, latency).await;
        self.stats.set(&area_latency_key(area_id), latency).await;
        event
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use berth_types::ManualClock;

    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn store() -> (Arc<ManualClock>, Arc<StatisticsEngine>, StateStore) {
        let clock = Arc::new(ManualClock::new(NOW));
        let stats = Arc::new(StatisticsEngine::new(clock.clone()));
        let store = StateStore::new(clock.clone(), Arc::clone(&stats));
        (clock, stats, store)
    }

    fn millis(seconds: i64) -> FeedTime {
        FeedTime::from_millis(seconds * 1000)
    }

    async fn berth(store: &StateStore, area: &str, berth: &str) -> Option<Berth> {
        store
            .read(|s| s.area(area).and_then(|a| a.berths().get(berth)).cloned())
            .await
    }

    #[tokio::test]
    async fn transfer_moves_description() {
        let (_, _, store) = store();
        let t0 = millis(NOW - 30);
        store.apply_interpose(&t0, "WY", "0101", "T1").await;

        let t1 = millis(NOW - 5);
        store.apply_transfer(&t1, "WY", "0101", "0103", "X").await;

        let from = berth(&store, "WY", "0101").await.unwrap();
        let to = berth(&store, "WY", "0103").await.unwrap();
        assert_eq!(from.descr, "");
        assert!(!from.is_occupied());
        assert_eq!(to.descr, "X");
        assert_eq!(to.timestamp, NOW - 5);
    }

    #[tokio::test]
    async fn cancel_always_vacates() {
        let (_, _, store) = store();
        let t = millis(NOW);
        store.apply_interpose(&t, "WY", "0200", "2C45").await;
        store.apply_cancel(&t, "WY", "0200").await;
        assert_eq!(berth(&store, "WY", "0200").await.unwrap().descr, "");

        store.apply_cancel(&t, "WY", "0999").await;
        let never_set = berth(&store, "WY", "0999").await.unwrap();
        assert!(!never_set.is_occupied());
    }

    #[tokio::test]
    async fn heartbeat_and_signal_are_stored_verbatim() {
        let (_, _, store) = store();
        let t = millis(NOW - 1);
        store.apply_heartbeat(&t, "SK", "1732").await;
        store.apply_signal(&t, "SK", "0A", "7F").await;
        store.apply_signal(&t, "SK", "0A", "80").await;

        let (heartbeat, signal, timestamp) = store
            .read(|s| {
                let area = s.area("SK").unwrap();
                (
                    area.heartbeat().to_owned(),
                    area.signals().get("0A").cloned(),
                    area.timestamp(),
                )
            })
            .await;
        assert_eq!(heartbeat, "1732");
        assert_eq!(signal.as_deref(), Some("80"));
        assert_eq!(timestamp, NOW - 1);
    }

    #[tokio::test]
    async fn latency_is_recorded_globally_and_per_area() {
        let (_, stats, store) = store();
        let event_millis = (NOW - 3) * 1000 + 250;
        store
            .apply_interpose(&FeedTime::from_millis(event_millis), "AB", "1", "1A01")
            .await;

        let all = stats.get(LATENCY_ALL_KEY).await.unwrap();
        let area = stats.get("feed.latency.AB").await.unwrap();
        assert_eq!(all.current.value, 3);
        assert_eq!(area.current.value, 3);
    }

    #[tokio::test]
    async fn bad_time_skips_timestamps_but_keeps_state() {
        let (_, stats, store) = store();
        store.apply_interpose(&millis(NOW - 10), "AB", "1", "OLD").await;

        store
            .apply_interpose(&FeedTime::new("not-a-number"), "AB", "1", "NEW")
            .await;

        let (global, area_ts, b) = store
            .read(|s| {
                let area = s.area("AB").unwrap();
                (s.last_update(), area.timestamp(), area.berths()["1"].clone())
            })
            .await;
        assert_eq!(global, NOW - 10);
        assert_eq!(area_ts, NOW - 10);
        assert_eq!(b.descr, "NEW");
        assert_eq!(b.timestamp, NOW);
        assert_eq!(stats.get(LATENCY_ALL_KEY).await.unwrap().current.count, 1);
    }

    #[tokio::test]
    async fn bad_time_on_new_area_leaves_it_unstamped() {
        let (_, stats, store) = store();
        store.apply_signal(&FeedTime::new(""), "ZZ", "01", "00").await;

        let ts = store.read(|s| s.area("ZZ").map(Area::timestamp)).await;
        assert_eq!(ts, Some(0));
        assert!(stats.get(LATENCY_ALL_KEY).await.is_none());
    }

    #[tokio::test]
    async fn arrival_order_wins_over_event_time() {
        let (_, _, store) = store();
        store.apply_interpose(&millis(NOW - 1), "AB", "1", "NEWER").await;
        store.apply_interpose(&millis(NOW - 100), "AB", "1", "OLDER").await;

        let b = berth(&store, "AB", "1").await.unwrap();
        assert_eq!(b.descr, "OLDER");
        assert_eq!(store.read(FeedState::last_update).await, NOW - 100);
    }
}
