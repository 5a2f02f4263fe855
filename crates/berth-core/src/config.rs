//! Configuration loading and typed config structures.
//!
//! The service reads one YAML file (by default `berth-config.yaml`). Every
//! field has a default, so an empty file is valid YAML; [`BerthConfig::validate`]
//! then rejects the few settings that have no sensible default.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A setting is missing or out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BerthConfig {
    /// Connection and listener settings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Feed subscription.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Statistics engine behaviour.
    #[serde(default)]
    pub statistics: StatisticsConfig,

    /// Graphite forwarding.
    #[serde(default)]
    pub graphite: GraphiteConfig,

    /// TTL sweep, daily reset and gauge schedules.
    #[serde(default)]
    pub reaper: ReaperConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BerthConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `NATS_URL` overrides `infrastructure.nats_url` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the service cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.queue.trim().is_empty() {
            return Err(ConfigError::Invalid(String::from("feed.queue is required")));
        }
        if self.feed.subject.trim().is_empty() {
            return Err(ConfigError::Invalid(String::from(
                "feed.subject is required",
            )));
        }
        if self.reaper.reset_hour > 23 {
            return Err(ConfigError::Invalid(format!(
                "reaper.reset_hour must be 0-23, got {}",
                self.reaper.reset_hour
            )));
        }
        let periods = [
            ("statistics.tick_seconds", self.statistics.tick_seconds),
            ("reaper.sweep_seconds", self.reaper.sweep_seconds),
            ("reaper.berth_stats_seconds", self.reaper.berth_stats_seconds),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be positive")));
        }
        if self.reaper.ttl_seconds <= 0 {
            return Err(ConfigError::Invalid(String::from(
                "reaper.ttl_seconds must be positive",
            )));
        }
        Ok(())
    }
}

/// Connection and listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS messaging URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Address the query API binds to.
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// Port the query API listens on.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl InfrastructureConfig {
    /// Override the NATS URL from the environment when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.nats_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            http_host: default_http_host(),
            http_port: default_http_port(),
        }
    }
}

/// What the ingestion supervisor does with a batch that will not decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeErrorPolicy {
    /// Stop the service.
    #[default]
    Shutdown,
    /// Log, drop the batch without redelivery, and carry on.
    Skip,
}

/// Feed subscription settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// `JetStream` stream holding the feed.
    #[serde(default = "default_stream")]
    pub stream: String,

    /// Subject the feed is published on. Required.
    #[serde(default)]
    pub subject: String,

    /// Consumer name. Required.
    #[serde(default)]
    pub queue: String,

    /// Keep the consumer across restarts.
    #[serde(default)]
    pub durable: bool,

    /// Free-form description shown in NATS monitoring.
    #[serde(default)]
    pub consumer_tag: String,

    /// Handling of undecodable batches.
    #[serde(default)]
    pub on_decode_error: DecodeErrorPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            stream: default_stream(),
            subject: String::new(),
            queue: String::new(),
            durable: false,
            consumer_tag: String::new(),
            on_decode_error: DecodeErrorPolicy::default(),
        }
    }
}

/// Statistics engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatisticsConfig {
    /// Log each sampled statistic on every tick.
    #[serde(default)]
    pub log: bool,

    /// Serve `GET /stats`.
    #[serde(default = "default_true")]
    pub endpoint: bool,

    /// Seconds between collection ticks.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            log: false,
            endpoint: true,
            tick_seconds: default_tick_seconds(),
        }
    }
}

/// Graphite forwarding settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphiteConfig {
    /// Publish metrics on every statistics tick.
    #[serde(default)]
    pub enabled: bool,

    /// Prefix prepended to every metric name.
    #[serde(default)]
    pub prefix: String,

    /// Subject root that metric lines are published under.
    #[serde(default = "default_graphite_subject")]
    pub subject: String,
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: String::new(),
            subject: default_graphite_subject(),
        }
    }
}

/// TTL sweep, daily reset and gauge schedules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReaperConfig {
    /// Occupied berths untouched for longer than this are vacated.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,

    /// Seconds between TTL sweeps.
    #[serde(default = "default_sweep_seconds")]
    pub sweep_seconds: u64,

    /// UTC hour of the daily full reset.
    #[serde(default = "default_reset_hour")]
    pub reset_hour: u32,

    /// Seconds between gauge collections.
    #[serde(default = "default_berth_stats_seconds")]
    pub berth_stats_seconds: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            sweep_seconds: default_sweep_seconds(),
            reset_hour: default_reset_hour(),
            berth_stats_seconds: default_berth_stats_seconds(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_nats_url() -> String {
    String::from("nats://localhost:4222")
}

fn default_http_host() -> String {
    String::from("0.0.0.0")
}

const fn default_http_port() -> u16 {
    8080
}

fn default_stream() -> String {
    String::from("TD")
}

const fn default_true() -> bool {
    true
}

const fn default_tick_seconds() -> u64 {
    60
}

fn default_graphite_subject() -> String {
    String::from("graphite")
}

const fn default_ttl_seconds() -> i64 {
    crate::reaper::DEFAULT_TTL_SECONDS
}

const fn default_sweep_seconds() -> u64 {
    600
}

const fn default_reset_hour() -> u32 {
    2
}

const fn default_berth_stats_seconds() -> u64 {
    10
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_schedule() {
        let config = BerthConfig::default();
        assert_eq!(config.feed.stream, "TD");
        assert_eq!(config.statistics.tick_seconds, 60);
        assert_eq!(config.reaper.ttl_seconds, 10_800);
        assert_eq!(config.reaper.sweep_seconds, 600);
        assert_eq!(config.reaper.reset_hour, 2);
        assert_eq!(config.reaper.berth_stats_seconds, 10);
        assert_eq!(config.graphite.subject, "graphite");
        assert_eq!(config.infrastructure.http_port, 8080);
        assert_eq!(config.feed.on_decode_error, DecodeErrorPolicy::Shutdown);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
infrastructure:
  http_host: "127.0.0.1"
  http_port: 9090

feed:
  stream: "NROD"
  subject: "nrod.td"
  queue: "td-view"
  durable: true
  consumer_tag: "td"
  on_decode_error: skip

statistics:
  log: true
  endpoint: false
  tick_seconds: 30

graphite:
  enabled: true
  prefix: "uktra"
  subject: "metrics"

reaper:
  ttl_seconds: 3600
  sweep_seconds: 300
  reset_hour: 3
  berth_stats_seconds: 5

logging:
  level: "debug"
  json: true
"#;

        let config = BerthConfig::parse(yaml).unwrap();
        assert_eq!(config.infrastructure.http_port, 9090);
        assert_eq!(config.feed.stream, "NROD");
        assert_eq!(config.feed.queue, "td-view");
        assert!(config.feed.durable);
        assert_eq!(config.feed.on_decode_error, DecodeErrorPolicy::Skip);
        assert!(config.statistics.log);
        assert!(!config.statistics.endpoint);
        assert!(config.graphite.enabled);
        assert_eq!(config.graphite.prefix, "uktra");
        assert_eq!(config.reaper.reset_hour, 3);
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(BerthConfig::parse("").is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = BerthConfig::from_file(Path::new("/nonexistent/berth-config.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn queue_and_subject_are_required() {
        let missing_queue = BerthConfig::parse("feed:\n  subject: td\n").unwrap();
        assert!(matches!(
            missing_queue.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("feed.queue")
        ));

        let missing_subject = BerthConfig::parse("feed:\n  queue: td\n").unwrap();
        assert!(matches!(
            missing_subject.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("feed.subject")
        ));
    }

    #[test]
    fn zero_period_is_rejected() {
        let config =
            BerthConfig::parse("feed: {queue: q, subject: s}\nreaper: {sweep_seconds: 0}\n")
                .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_reset_hour_is_rejected() {
        let config =
            BerthConfig::parse("feed: {queue: q, subject: s}\nreaper: {reset_hour: 24}\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            BerthConfig::parse("feed: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
