//! Shared type definitions for the berth occupancy service.
//!
//! Every crate in the workspace speaks in terms of the types defined here:
//! the train describer wire messages delivered by the feed, and the
//! [`Clock`] seam that lets the store, the statistics engine and the
//! reaper agree on "now" (and lets tests pin it).
//!
//! # Modules
//!
//! - [`clock`] -- Wall-clock abstraction with system and manual implementations
//! - [`messages`] -- Feed envelope and the five typed message kinds

pub mod clock;
pub mod messages;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use messages::{
    CancelMessage, Envelope, FeedMessage, FeedTime, HeartbeatMessage, InterposeMessage,
    SignalKind, SignalMessage, TransferMessage,
};
