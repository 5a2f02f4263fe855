//! Error types for the service binary.
//!
//! [`EngineError`] is the top-level error type that wraps every failure
//! mode during startup and while the service runs.

use crate::ingest::IngestError;

/// Top-level error for the service binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: berth_core::config::ConfigError,
    },

    /// NATS connection failed.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },

    /// Feed ingestion stopped.
    #[error("ingest error: {source}")]
    Ingest {
        /// The underlying ingestion error.
        #[from]
        source: IngestError,
    },

    /// Query API server failed to start.
    #[error("observer error: {message}")]
    Observer {
        /// Description of the observer failure.
        message: String,
    },

    /// Logging could not be initialized.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the logging failure.
        message: String,
    },
}
