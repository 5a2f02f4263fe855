//! Applies decoded feed batches to the [`StateStore`].
//!
//! A batch is a JSON array of envelopes. Envelopes are applied in order and
//! each envelope's messages in priority order (transfer, cancel, interpose,
//! heartbeat, `SF`, `SG`, `SH`), every populated kind included. A payload
//! that does not decode as an envelope array is reported as
//! [`DispatchError::Decode`]; deciding whether that is fatal is left to the
//! caller.

use std::sync::Arc;

use berth_types::{Envelope, FeedMessage};
use tracing::trace;

use crate::store::StateStore;

/// Errors raised while handling a feed payload.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The payload is not a JSON array of envelope objects.
    #[error("malformed feed batch: {source}")]
    Decode {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Decode a raw bus payload into envelopes.
///
/// # Errors
///
/// Returns [`DispatchError::Decode`] if the payload is not an array of
/// envelope objects.
pub fn decode_batch(payload: &[u8]) -> Result<Vec<Envelope>, DispatchError> {
    Ok(serde_json::from_slice(payload)?)
}

/// What one dispatched batch contained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Envelopes in the batch.
    pub envelopes: usize,
    /// Typed messages applied across all envelopes.
    pub messages: usize,
}

/// Routes typed feed messages to the matching store operation.
#[derive(Debug, Clone)]
pub struct MessageDispatcher {
    store: Arc<StateStore>,
}

impl MessageDispatcher {
    /// Create a dispatcher writing into `store`.
    pub const fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Apply a single message.
    pub async fn apply(&self, message: &FeedMessage) {
        trace!(kind = message.code(), area = message.area_id(), "applying");
        match message {
            FeedMessage::Transfer(m) => {
                self.store
                    .apply_transfer(&m.time, &m.area_id, &m.from, &m.to, &m.descr)
                    .await;
            }
            FeedMessage::Cancel(m) => {
                self.store.apply_cancel(&m.time, &m.area_id, &m.from).await;
            }
            FeedMessage::Interpose(m) => {
                self.store
                    .apply_interpose(&m.time, &m.area_id, &m.to, &m.descr)
                    .await;
            }
            FeedMessage::Heartbeat(m) => {
                self.store
                    .apply_heartbeat(&m.time, &m.area_id, &m.report_time)
                    .await;
            }
            FeedMessage::Signal { message: m, .. } => {
                self.store
                    .apply_signal(&m.time, &m.area_id, &m.address, &m.data)
                    .await;
            }
        }
    }

    /// Apply every message of every envelope, in order.
    pub async fn dispatch(&self, batch: &[Envelope]) -> DispatchReport {
        let mut report = DispatchReport {
            envelopes: batch.len(),
            messages: 0,
        };
        for message in batch.iter().flat_map(Envelope::messages) {
            self.apply(message).await;
            report.messages = report.messages.saturating_add(1);
        }
        report
    }

    /// Decode and apply a raw payload.
    ///
    /// Nothing is applied if decoding fails.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Decode`] for a malformed payload.
    pub async fn dispatch_payload(&self, payload: &[u8]) -> Result<DispatchReport, DispatchError> {
        let batch = decode_batch(payload)?;
        Ok(self.dispatch(&batch).await)
    }
}
