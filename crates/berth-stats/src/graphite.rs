//! Graphite plaintext formatting.
//!
//! Each field of a closed aggregate becomes one line
//! `"<name> <value> <timestamp>"`. `min`, `max` and `ave` are only emitted
//! when the period had samples, so sentinel bounds never reach the sink.

use std::fmt;

use crate::statistic::Statistic;

/// One Graphite datapoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLine {
    /// Dotted metric path, prefix included.
    pub name: String,
    /// Integer value.
    pub value: i64,
    /// Unix seconds.
    pub timestamp: i64,
}

impl fmt::Display for MetricLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.value, self.timestamp)
    }
}

/// Lines for one statistic, named `<prefix>.<key>.<field>`.
///
/// An empty `prefix` is omitted.
pub fn metric_lines(prefix: &str, key: &str, stat: &Statistic) -> Vec<MetricLine> {
    let base = if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    };

    let mut fields = vec![("value", stat.value), ("count", stat.count)];
    if stat.has_samples() {
        fields.extend([("min", stat.min), ("max", stat.max), ("ave", stat.average)]);
    }

    fields
        .into_iter()
        .map(|(field, value)| MetricLine {
            name: format!("{base}.{field}"),
            value,
            timestamp: stat.timestamp,
        })
        .collect()
}
