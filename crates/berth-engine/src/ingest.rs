//! Feed ingestion from a NATS `JetStream` pull consumer.
//!
//! Each bus message carries one batch: a JSON array of envelopes. Messages
//! are handled strictly one at a time and acknowledged only after the
//! whole batch has been applied to the store. A batch that will not decode
//! is handled per [`DecodeErrorPolicy`].

use async_nats::jetstream::consumer::{AckPolicy, pull};
use async_nats::jetstream::{self, AckKind};
use berth_core::config::{DecodeErrorPolicy, FeedConfig};
use berth_core::{DispatchError, DispatchReport, MessageDispatcher};
use futures::StreamExt as _;
use tracing::{debug, info, warn};

/// Errors that end feed ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Stream/consumer setup, fetch or ack failed.
    #[error("NATS error: {0}")]
    Nats(String),

    /// A batch did not decode and the policy is to stop.
    #[error("undecodable batch: {source}")]
    Decode {
        /// The underlying dispatch error.
        #[from]
        source: DispatchError,
    },

    /// The consumer's message stream ended.
    #[error("feed message stream closed")]
    Closed,
}

/// What to tell the bus about a handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Batch applied.
    Ack(DispatchReport),
    /// Batch dropped; never redeliver.
    Terminate,
}

/// Applies bus payloads to the store and decides their acknowledgement.
#[derive(Debug, Clone)]
pub struct FeedIngest {
    dispatcher: MessageDispatcher,
    policy: DecodeErrorPolicy,
}

impl FeedIngest {
    /// Create an ingest loop feeding `dispatcher`.
    pub const fn new(dispatcher: MessageDispatcher, policy: DecodeErrorPolicy) -> Self {
        Self { dispatcher, policy }
    }

    /// Apply one payload.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Decode`] for a malformed batch under
    /// [`DecodeErrorPolicy::Shutdown`].
    pub async fn handle(&self, payload: &[u8]) -> Result<Disposition, IngestError> {
        match self.dispatcher.dispatch_payload(payload).await {
            Ok(report) => Ok(Disposition::Ack(report)),
            Err(e) => match self.policy {
                DecodeErrorPolicy::Shutdown => Err(e.into()),
                DecodeErrorPolicy::Skip => {
                    warn!(error = %e, bytes = payload.len(), "dropping undecodable batch");
                    Ok(Disposition::Terminate)
                }
            },
        }
    }

    /// Pull and apply messages until the stream ends or a fatal error.
    ///
    /// Never returns `Ok`: the feed is expected to run forever.
    pub async fn run(&self, mut messages: pull::Stream) -> Result<(), IngestError> {
        info!("feed ingestion started");
        while let Some(next) = messages.next().await {
            let message = next.map_err(|e| IngestError::Nats(format!("fetch failed: {e}")))?;
            let ack = match self.handle(&message.message.payload).await? {
                Disposition::Ack(report) => {
                    debug!(
                        envelopes = report.envelopes,
                        messages = report.messages,
                        "batch applied"
                    );
                    message.ack().await
                }
                Disposition::Terminate => message.ack_with(AckKind::Term).await,
            };
            ack.map_err(|e| IngestError::Nats(format!("ack failed: {e}")))?;
        }
        Err(IngestError::Closed)
    }
}

/// Get or create the feed stream and its pull consumer, then open the
/// message stream.
///
/// # Errors
///
/// Returns [`IngestError::Nats`] if any `JetStream` call fails.
pub async fn subscribe(
    client: async_nats::Client,
    feed: &FeedConfig,
) -> Result<pull::Stream, IngestError> {
    let js = jetstream::new(client);

    let stream = js
        .get_or_create_stream(jetstream::stream::Config {
            name: feed.stream.clone(),
            subjects: vec![feed.subject.clone()],
            ..Default::default()
        })
        .await
        .map_err(|e| IngestError::Nats(format!("stream {}: {e}", feed.stream)))?;

    let description = (!feed.consumer_tag.is_empty()).then(|| feed.consumer_tag.clone());
    let consumer = stream
        .get_or_create_consumer(
            &feed.queue,
            pull::Config {
                durable_name: feed.durable.then(|| feed.queue.clone()),
                name: Some(feed.queue.clone()),
                description,
                ack_policy: AckPolicy::Explicit,
                filter_subject: feed.subject.clone(),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| IngestError::Nats(format!("consumer {}: {e}", feed.queue)))?;

    let messages = consumer
        .messages()
        .await
        .map_err(|e| IngestError::Nats(format!("messages {}: {e}", feed.queue)))?;

    info!(
        stream = feed.stream.as_str(),
        subject = feed.subject.as_str(),
        consumer = feed.queue.as_str(),
        durable = feed.durable,
        "feed consumer ready"
    );
    Ok(messages)
}
