//! Train describer feed messages.
//!
//! The feed delivers a JSON array of envelopes. Each envelope is an object
//! whose keys say which message kinds it carries:
//!
//! | Key | Kind | Meaning |
//! |-----|------|---------|
//! | `CA_MSG` | [`TransferMessage`] | Berth step: train moves `from` -> `to` |
//! | `CB_MSG` | [`CancelMessage`] | Berth cancel: description withdrawn |
//! | `CC_MSG` | [`InterposeMessage`] | Interpose: description placed in a berth |
//! | `CT_MSG` | [`HeartbeatMessage`] | Area heartbeat |
//! | `SF_MSG` / `SG_MSG` / `SH_MSG` | [`SignalMessage`] | Raw signalling data |
//!
//! An envelope may carry more than one key. Decoding turns it into an
//! ordered list of [`FeedMessage`] values so the dispatcher can apply them
//! with a single `match` in a fixed priority order.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Event time
// ---------------------------------------------------------------------------

/// Event time as carried on the wire: epoch milliseconds, sent either as a
/// decimal string or a JSON number.
///
/// The raw text is kept verbatim. Parsing happens at apply time so a
/// malformed value only disables the timestamp side effects of one message
/// rather than failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeedTime(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFeedTime {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl<'de> Deserialize<'de> for FeedTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<RawFeedTime>::deserialize(deserializer)?;
        let text = match raw {
            None => String::new(),
            Some(RawFeedTime::Text(s)) => s,
            Some(RawFeedTime::Signed(n)) => n.to_string(),
            Some(RawFeedTime::Unsigned(n)) => n.to_string(),
            Some(RawFeedTime::Float(f)) => f.to_string(),
        };
        Ok(Self(text))
    }
}

impl FeedTime {
    /// Wrap raw feed text.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build a feed time from epoch milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.to_string())
    }

    /// The raw text as received.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse as epoch milliseconds. `None` if the text is not an integer.
    pub fn epoch_millis(&self) -> Option<i64> {
        self.0.trim().parse::<i64>().ok()
    }

    /// Parse and truncate to epoch seconds.
    pub fn epoch_seconds(&self) -> Option<i64> {
        self.epoch_millis().and_then(|ms| ms.checked_div(1000))
    }
}

// ---------------------------------------------------------------------------
// Message payloads
// ---------------------------------------------------------------------------

/// `CA` berth step: the description leaves `from` and arrives in `to`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferMessage {
    /// Event time in epoch milliseconds.
    pub time: FeedTime,
    /// Train describer area.
    pub area_id: String,
    /// Berth the train left.
    pub from: String,
    /// Berth the train entered.
    pub to: String,
    /// Train description (headcode).
    pub descr: String,
}

/// `CB` berth cancel: the description is withdrawn from `from`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CancelMessage {
    /// Event time in epoch milliseconds.
    pub time: FeedTime,
    /// Train describer area.
    pub area_id: String,
    /// Berth being cleared.
    pub from: String,
    /// Description that was cancelled (informational only).
    pub descr: String,
}

/// `CC` interpose: a description appears in `to` with no recorded origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterposeMessage {
    /// Event time in epoch milliseconds.
    pub time: FeedTime,
    /// Train describer area.
    pub area_id: String,
    /// Berth receiving the description.
    pub to: String,
    /// Train description (headcode).
    pub descr: String,
}

/// `CT` heartbeat carrying the area's report time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatMessage {
    /// Event time in epoch milliseconds.
    pub time: FeedTime,
    /// Train describer area.
    pub area_id: String,
    /// Opaque liveness token, stored verbatim.
    pub report_time: String,
}

/// `SF`/`SG`/`SH` signalling update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalMessage {
    /// Event time in epoch milliseconds.
    pub time: FeedTime,
    /// Train describer area.
    pub area_id: String,
    /// Message type as sent by the feed (`SF`, `SG`, `SH`).
    pub msg_type: String,
    /// Signalling address within the area.
    pub address: String,
    /// Raw signalling data, stored verbatim.
    pub data: String,
}

/// Which member of the S-class a signal message arrived as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// `SF_MSG` -- signalling update.
    Sf,
    /// `SG_MSG` -- signalling refresh.
    Sg,
    /// `SH_MSG` -- signalling refresh finished.
    Sh,
}

impl SignalKind {
    /// The two-letter wire code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Sf => "SF",
            Self::Sg => "SG",
            Self::Sh => "SH",
        }
    }
}

// ---------------------------------------------------------------------------
// Tagged message and envelope
// ---------------------------------------------------------------------------

/// One typed message extracted from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// `CA_MSG`.
    Transfer(TransferMessage),
    /// `CB_MSG`.
    Cancel(CancelMessage),
    /// `CC_MSG`.
    Interpose(InterposeMessage),
    /// `CT_MSG`.
    Heartbeat(HeartbeatMessage),
    /// `SF_MSG`, `SG_MSG` or `SH_MSG`.
    Signal {
        /// Which key the message arrived under.
        kind: SignalKind,
        /// The payload.
        message: SignalMessage,
    },
}

impl FeedMessage {
    /// Two-letter wire code, for logging.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Transfer(_) => "CA",
            Self::Cancel(_) => "CB",
            Self::Interpose(_) => "CC",
            Self::Heartbeat(_) => "CT",
            Self::Signal { kind, .. } => kind.code(),
        }
    }

    /// Area the message refers to.
    pub fn area_id(&self) -> &str {
        match self {
            Self::Transfer(m) => &m.area_id,
            Self::Cancel(m) => &m.area_id,
            Self::Interpose(m) => &m.area_id,
            Self::Heartbeat(m) => &m.area_id,
            Self::Signal { message, .. } => &message.area_id,
        }
    }
}

/// Wire shape of one envelope: at most one payload per key.
#[derive(Debug, Default, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "CA_MSG")]
    ca: Option<TransferMessage>,
    #[serde(rename = "CB_MSG")]
    cb: Option<CancelMessage>,
    #[serde(rename = "CC_MSG")]
    cc: Option<InterposeMessage>,
    #[serde(rename = "CT_MSG")]
    ct: Option<HeartbeatMessage>,
    #[serde(rename = "SF_MSG")]
    sf: Option<SignalMessage>,
    #[serde(rename = "SG_MSG")]
    sg: Option<SignalMessage>,
    #[serde(rename = "SH_MSG")]
    sh: Option<SignalMessage>,
}

/// One batch unit from the feed.
///
/// Holds every populated message kind in application order: transfer,
/// cancel, interpose, heartbeat, then `SF`, `SG`, `SH`. Unknown keys are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "WireEnvelope")]
pub struct Envelope {
    messages: Vec<FeedMessage>,
}

impl From<WireEnvelope> for Envelope {
    fn from(wire: WireEnvelope) -> Self {
        let signals = [
            (SignalKind::Sf, wire.sf),
            (SignalKind::Sg, wire.sg),
            (SignalKind::Sh, wire.sh),
        ];
        let messages = wire
            .ca
            .map(FeedMessage::Transfer)
            .into_iter()
            .chain(wire.cb.map(FeedMessage::Cancel))
            .chain(wire.cc.map(FeedMessage::Interpose))
            .chain(wire.ct.map(FeedMessage::Heartbeat))
            .chain(signals.into_iter().filter_map(|(kind, message)| {
                message.map(|message| FeedMessage::Signal { kind, message })
            }))
            .collect();
        Self { messages }
    }
}

impl Envelope {
    /// Build an envelope from already-typed messages, kept in the given order.
    pub const fn from_messages(messages: Vec<FeedMessage>) -> Self {
        Self { messages }
    }

    /// The messages in application order.
    pub fn messages(&self) -> &[FeedMessage] {
        &self.messages
    }

    /// `true` when no known key was populated.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
