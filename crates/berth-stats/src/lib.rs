//! Windowed statistics for the berth occupancy service.
//!
//! Named counters accumulate `value`, `count`, `min`, `max`, `sum` and a
//! derived `average` between collection ticks. Each tick folds the live
//! aggregate into a five-entry buffer; every fifth tick the buffer is
//! compacted into one history point and the history is capped at
//! [`MAX_HISTORY`] entries. With the default one-minute tick this keeps
//! six hours of five-minute history per key.
//!
//! # Modules
//!
//! - [`statistic`] -- The [`Statistic`] aggregate and its display view
//! - [`engine`] -- [`StatisticsEngine`], the mutex-guarded counter table
//! - [`graphite`] -- Graphite plaintext line formatting for the metrics sink

pub mod engine;
pub mod graphite;
pub mod statistic;

pub use engine::{CollectedStatistic, StatisticsEngine};
pub use graphite::{MetricLine, metric_lines};
pub use statistic::{HISTORY_PERIOD, MAX_HISTORY, Statistic, StatisticSnapshot, StatisticView};
