//! Forwards closed statistics periods to Graphite over NATS.
//!
//! Every metric line is published as its own message on
//! `<subject>.<metric name>`; a bridge on the other side writes the
//! payload verbatim to a Graphite plaintext socket.

use berth_stats::{CollectedStatistic, metric_lines};
use tracing::{debug, warn};

/// Publishes statistics aggregates as Graphite lines.
#[derive(Debug, Clone)]
pub struct GraphitePublisher {
    client: async_nats::Client,
    prefix: String,
    subject: String,
}

impl GraphitePublisher {
    /// Create a publisher on `client`.
    pub const fn new(client: async_nats::Client, prefix: String, subject: String) -> Self {
        Self {
            client,
            prefix,
            subject,
        }
    }

    /// Publish every line for `collected`. Failures are logged and skipped.
    ///
    /// Returns the number of lines published.
    pub async fn publish(&self, collected: &[CollectedStatistic]) -> usize {
        let mut sent: usize = 0;
        for (subject, payload) in graphite_messages(&self.prefix, &self.subject, collected) {
            match self.client.publish(subject.clone(), payload.into()).await {
                Ok(()) => sent = sent.saturating_add(1),
                Err(e) => warn!(subject = subject.as_str(), error = %e, "graphite publish failed"),
            }
        }
        debug!(lines = sent, "graphite metrics published");
        sent
    }
}

/// `(subject, payload)` pairs for a tick's aggregates.
pub fn graphite_messages(
    prefix: &str,
    subject: &str,
    collected: &[CollectedStatistic],
) -> Vec<(String, String)> {
    collected
        .iter()
        .flat_map(|c| metric_lines(prefix, &c.key, &c.aggregate))
        .map(|line| (format!("{subject}.{}", line.name), line.to_string()))
        .collect()
}
