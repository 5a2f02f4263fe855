//! Housekeeping over the [`StateStore`]: TTL eviction, the daily full
//! reset, and the size gauges.
//!
//! The feed occasionally drops clearance messages, leaving descriptions
//! stuck in berths. [`Reaper::sweep_stale`] vacates any occupied berth not
//! touched within the TTL. [`Reaper::full_reset`] wipes every area once a
//! day so clients get a known discontinuity. Both hold the store lock for
//! the whole scan.

use std::sync::Arc;

use berth_stats::StatisticsEngine;
use berth_types::SharedClock;
use tracing::info;

use crate::store::{Area, FeedState, StateStore};

/// Default berth TTL: three hours.
pub const DEFAULT_TTL_SECONDS: i64 = 3 * 3600;

/// Gauge: number of areas.
pub const AREAS_KEY: &str = "feed.areas";
/// Gauge: number of berths, occupied or not.
pub const BERTHS_TOTAL_KEY: &str = "feed.berths.total";
/// Gauge: number of occupied berths.
pub const BERTHS_OCCUPIED_KEY: &str = "feed.berths.occupied";

/// Outcome of one TTL sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Areas scanned.
    pub areas: usize,
    /// Berths scanned.
    pub berths: usize,
    /// Berths still occupied after the sweep.
    pub active: usize,
    /// Berths vacated by this sweep.
    pub cleared: usize,
}

/// Size of the model at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BerthCounts {
    /// Number of areas.
    pub areas: usize,
    /// Number of berths across all areas.
    pub berths: usize,
    /// Number of occupied berths.
    pub occupied: usize,
}

impl BerthCounts {
    /// Count everything in `state`.
    pub fn of(state: &FeedState) -> Self {
        let areas = state.areas().values();
        Self {
            areas: state.areas().len(),
            berths: areas.clone().map(|a| a.berths().len()).sum(),
            occupied: areas.map(Area::occupied_count).sum(),
        }
    }
}

/// Scheduled maintenance jobs over the store.
#[derive(Debug, Clone)]
pub struct Reaper {
    clock: SharedClock,
    store: Arc<StateStore>,
    stats: Arc<StatisticsEngine>,
}

impl Reaper {
    /// Create a reaper for `store`, publishing gauges into `stats`.
    pub const fn new(
        clock: SharedClock,
        store: Arc<StateStore>,
        stats: Arc<StatisticsEngine>,
    ) -> Self {
        Self {
            clock,
            store,
            stats,
        }
    }

    /// Vacate every occupied berth last updated before `now - ttl_seconds`.
    ///
    /// Berths are cleared, never removed.
    pub async fn sweep_stale(&self, ttl_seconds: i64) -> SweepReport {
        let deadline = self.clock.now_unix().saturating_sub(ttl_seconds);
        let report = self
            .store
            .write(|state| {
                let mut report = SweepReport {
                    areas: state.areas().len(),
                    ..SweepReport::default()
                };
                for berth in state.areas_mut().flat_map(|area| area.berths_mut()) {
                    report.berths = report.berths.saturating_add(1);
                    if berth.is_occupied() && berth.timestamp < deadline {
                        berth.vacate();
                        report.cleared = report.cleared.saturating_add(1);
                    }
                    if berth.is_occupied() {
                        report.active = report.active.saturating_add(1);
                    }
                }
                report
            })
            .await;

        info!(
            areas = report.areas,
            berths = report.berths,
            active = report.active,
            cleared = report.cleared,
            "stale berth sweep"
        );
        report
    }

    /// Discard every area and record the reset time.
    ///
    /// Returns the reset timestamp.
    pub async fn full_reset(&self) -> i64 {
        let now = self.clock.now_unix();
        let discarded = self
            .store
            .write(|state| {
                let discarded = state.areas().len();
                state.clear(now);
                discarded
            })
            .await;
        info!(discarded, reset = now, "full state reset");
        now
    }

    /// Publish area, berth and occupied-berth gauges.
    pub async fn collect_berth_counts(&self) -> BerthCounts {
        let counts = self.store.read(BerthCounts::of).await;
        self.stats.set(AREAS_KEY, gauge(counts.areas)).await;
        self.stats.set(BERTHS_TOTAL_KEY, gauge(counts.berths)).await;
        self.stats
            .set(BERTHS_OCCUPIED_KEY, gauge(counts.occupied))
            .await;
        counts
    }
}

fn gauge(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use berth_types::{FeedTime, ManualClock};

    use super::*;

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        clock: Arc<ManualClock>,
        stats: Arc<StatisticsEngine>,
        store: Arc<StateStore>,
        reaper: Reaper,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(NOW));
        let stats = Arc::new(StatisticsEngine::new(clock.clone()));
        let store = Arc::new(StateStore::new(clock.clone(), Arc::clone(&stats)));
        let reaper = Reaper::new(clock.clone(), Arc::clone(&store), Arc::clone(&stats));
        Fixture {
            clock,
            stats,
            store,
            reaper,
        }
    }

    async fn occupy(store: &StateStore, area: &str, berth: &str, descr: &str, at: i64) {
        store
            .apply_interpose(&FeedTime::from_millis(at * 1000), area, berth, descr)
            .await;
    }

    async fn descr(store: &StateStore, area: &str, berth: &str) -> String {
        store
            .read(|s| s.area(area).unwrap().berths()[berth].descr.clone())
            .await
    }

    #[tokio::test]
    async fn sweep_clears_only_expired_berths() {
        let f = fixture();
        occupy(&f.store, "AB", "old", "T2", NOW - 10_801).await;
        occupy(&f.store, "AB", "fresh", "T3", NOW - 10_799).await;

        let report = f.reaper.sweep_stale(DEFAULT_TTL_SECONDS).await;

        assert_eq!(descr(&f.store, "AB", "old").await, "");
        assert_eq!(descr(&f.store, "AB", "fresh").await, "T3");
        assert_eq!(
            report,
            SweepReport {
                areas: 1,
                berths: 2,
                active: 1,
                cleared: 1
            }
        );
    }

    #[tokio::test]
    async fn sweep_keeps_vacated_berths_in_place() {
        let f = fixture();
        occupy(&f.store, "AB", "1", "T1", NOW - 20_000).await;
        f.reaper.sweep_stale(DEFAULT_TTL_SECONDS).await;

        let total = f.store.read(|s| s.area("AB").unwrap().berths().len()).await;
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn full_reset_empties_and_stamps() {
        let f = fixture();
        occupy(&f.store, "AB", "1", "T1", NOW).await;
        occupy(&f.store, "CD", "2", "T2", NOW).await;
        f.clock.advance(90);

        let reset_at = f.reaper.full_reset().await;

        assert_eq!(reset_at, NOW + 90);
        let (areas, last_reset) = f
            .store
            .read(|s| (s.areas().len(), s.last_reset()))
            .await;
        assert_eq!(areas, 0);
        assert_eq!(last_reset, NOW + 90);
    }

    #[tokio::test]
    async fn berth_counts_are_published_as_gauges() {
        let f = fixture();
        occupy(&f.store, "AB", "1", "T1", NOW).await;
        occupy(&f.store, "AB", "2", "T2", NOW).await;
        f.store
            .apply_cancel(&FeedTime::from_millis(NOW * 1000), "CD", "9")
            .await;

        let counts = f.reaper.collect_berth_counts().await;
        assert_eq!(
            counts,
            BerthCounts {
                areas: 2,
                berths: 3,
                occupied: 2
            }
        );
        assert_eq!(f.stats.get(AREAS_KEY).await.unwrap().current.value, 2);
        assert_eq!(f.stats.get(BERTHS_TOTAL_KEY).await.unwrap().current.value, 3);
        assert_eq!(
            f.stats.get(BERTHS_OCCUPIED_KEY).await.unwrap().current.value,
            2
        );
    }
}
