//! The per-key aggregate and its history.
//!
//! A [`Statistic`] in its reset state uses `min = i64::MAX` and
//! `max = i64::MIN`, so `min > max` means "no samples this period". Code
//! that displays or forwards a statistic must check
//! [`Statistic::has_samples`] before trusting `min`/`max`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Maximum number of compacted history points kept per key.
pub const MAX_HISTORY: usize = 72;

/// Number of ticks folded into one history point.
pub const HISTORY_PERIOD: usize = 5;

/// Aggregate of the samples recorded in one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    /// Unix seconds of the last update (or of the reset, if none since).
    pub timestamp: i64,
    /// Current value: last `set`, or running total of `incr` deltas.
    pub value: i64,
    /// Number of updates.
    pub count: i64,
    /// Smallest value seen.
    pub min: i64,
    /// Largest value seen.
    pub max: i64,
    /// `sum / count`, or 0 with no samples.
    pub average: i64,
    /// Sum of every sample.
    pub sum: i64,
}

impl Statistic {
    /// A statistic in the "no samples" state, stamped `now`.
    pub const fn empty(now: i64) -> Self {
        Self {
            timestamp: now,
            value: 0,
            count: 0,
            min: i64::MAX,
            max: i64::MIN,
            average: 0,
            sum: 0,
        }
    }

    /// Whether at least one sample was recorded since the last reset.
    pub const fn has_samples(&self) -> bool {
        self.count > 0 && self.min <= self.max
    }

    /// Return to the "no samples" state.
    pub const fn reset(&mut self, now: i64) {
        *self = Self::empty(now);
    }

    /// Replace the current value with `value`.
    pub fn set(&mut self, value: i64, now: i64) {
        self.value = value;
        self.accumulate(value, now);
    }

    /// Add `delta` to the current value.
    pub fn incr(&mut self, delta: i64, now: i64) {
        self.value = self.value.saturating_add(delta);
        self.accumulate(delta, now);
    }

    fn accumulate(&mut self, sample: i64, now: i64) {
        self.sum = self.sum.saturating_add(sample);
        self.count = self.count.saturating_add(1);
        self.timestamp = now;
        self.min = self.min.min(self.value);
        self.max = self.max.max(self.value);
        self.refresh_average();
    }

    fn refresh_average(&mut self) {
        self.average = self.sum.checked_div(self.count).unwrap_or(0);
    }

    /// Fold a run of period aggregates into one history point.
    ///
    /// `value`, `count` and `sum` are summed; `min`/`max` span only the
    /// periods that had samples; the timestamp is that of the newest entry.
    pub fn compact(entries: &[Self]) -> Self {
        let mut point = Self::empty(entries.last().map_or(0, |e| e.timestamp));
        for entry in entries {
            point.value = point.value.saturating_add(entry.value);
            point.count = point.count.saturating_add(entry.count);
            point.sum = point.sum.saturating_add(entry.sum);
            if entry.has_samples() {
                point.min = point.min.min(entry.min);
                point.max = point.max.max(entry.max);
            }
        }
        point.refresh_average();
        point
    }
}

/// A statistic together with its compacted history, copied out of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticSnapshot {
    /// The last closed period; the live aggregate until the first tick.
    pub current: Statistic,
    /// Compacted history, oldest first.
    pub history: Vec<Statistic>,
}

/// Rolling state kept per key inside the engine.
#[derive(Debug, Clone)]
pub(crate) struct Series {
    pub(crate) current: Statistic,
    latest: Option<Statistic>,
    pending: Vec<Statistic>,
    history: VecDeque<Statistic>,
}

impl Series {
    pub(crate) fn new(now: i64) -> Self {
        Self {
            current: Statistic::empty(now),
            latest: None,
            pending: Vec::with_capacity(HISTORY_PERIOD),
            history: VecDeque::with_capacity(MAX_HISTORY),
        }
    }

    /// Push the current aggregate into the buffer, compacting every
    /// [`HISTORY_PERIOD`] entries, then reset the live counters.
    ///
    /// Returns the aggregate as it stood before the reset.
    pub(crate) fn roll(&mut self, now: i64) -> Statistic {
        let closed = self.current;
        self.latest = Some(closed);
        self.pending.push(closed);
        if self.pending.len() >= HISTORY_PERIOD {
            self.history.push_back(Statistic::compact(&self.pending));
            self.pending.clear();
            while self.history.len() > MAX_HISTORY {
                self.history.pop_front();
            }
        }
        self.current.reset(now);
        closed
    }

    pub(crate) fn snapshot(&self) -> StatisticSnapshot {
        StatisticSnapshot {
            current: self.latest.unwrap_or(self.current),
            history: self.history.iter().copied().collect(),
        }
    }
}

/// JSON shape of a statistic for clients: sentinel bounds become `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticView {
    /// Unix seconds of the last update.
    pub timestamp: i64,
    /// Current value.
    pub value: i64,
    /// Number of updates.
    pub count: i64,
    /// Smallest value, absent with no samples.
    pub min: Option<i64>,
    /// Largest value, absent with no samples.
    pub max: Option<i64>,
    /// Average value.
    pub average: i64,
    /// Sum of samples.
    pub sum: i64,
    /// Compacted history, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<StatisticView>,
}

impl From<&Statistic> for StatisticView {
    fn from(stat: &Statistic) -> Self {
        let sampled = stat.has_samples();
        Self {
            timestamp: stat.timestamp,
            value: stat.value,
            count: stat.count,
            min: sampled.then_some(stat.min),
            max: sampled.then_some(stat.max),
            average: stat.average,
            sum: stat.sum,
            history: Vec::new(),
        }
    }
}

impl From<&StatisticSnapshot> for StatisticView {
    fn from(snapshot: &StatisticSnapshot) -> Self {
        let mut view = Self::from(&snapshot.current);
        view.history = snapshot.history.iter().map(Self::from).collect();
        view
    }
}
