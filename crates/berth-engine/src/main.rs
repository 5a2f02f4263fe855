//! Service binary for the berth occupancy service.
//!
//! Wires the live store to the train describer feed on NATS, runs the
//! periodic housekeeping jobs and serves the query API. Runs until the
//! feed stream closes, a fatal ingestion error occurs, or `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load and validate configuration
//! 2. Initialize structured logging (tracing)
//! 3. Build the application context
//! 4. Full reset so the reset timestamp is always populated
//! 5. Bind and start the query API server
//! 6. Connect to NATS
//! 7. Start the scheduled jobs (statistics, gauges, sweep, daily reset)
//! 8. Subscribe to the feed and run ingestion

mod error;
mod graphite;
mod ingest;
mod scheduler;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use berth_core::AppContext;
use berth_core::config::{BerthConfig, LoggingConfig};
use berth_observer::{AppState, ServerConfig};
use berth_types::SystemClock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::graphite::GraphitePublisher;
use crate::ingest::FeedIngest;
use crate::scheduler::Schedule;

/// Config file used when neither a CLI argument nor `BERTH_CONFIG` is given.
const DEFAULT_CONFIG_PATH: &str = "berth-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails or ingestion stops.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config_path = config_path();
    let config = load_config(&config_path)?;
    config.validate()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        path = %config_path.display(),
        nats_url = config.infrastructure.nats_url,
        stream = config.feed.stream,
        subject = config.feed.subject,
        queue = config.feed.queue,
        "berth-engine starting"
    );

    // 3. Build the application context.
    let ctx = AppContext::new(SystemClock::shared(), &config.statistics);

    // 4. Start from a known-empty model.
    ctx.reaper().full_reset().await;

    // 5. Start the query API server.
    let server_config = ServerConfig {
        host: config.infrastructure.http_host.clone(),
        port: config.infrastructure.http_port,
    };
    let app_state =
        AppState::new(ctx.query()).with_stats_endpoint(config.statistics.endpoint);
    let observer = berth_observer::spawn_observer(server_config, Arc::new(app_state))
        .await
        .map_err(|e| EngineError::Observer {
            message: format!("{e}"),
        })?;

    // 6. Connect to NATS.
    let nats_url = &config.infrastructure.nats_url;
    info!(nats_url = nats_url, "Connecting to NATS");
    let client = async_nats::connect(nats_url)
        .await
        .map_err(|e| EngineError::Nats {
            message: format!("failed to connect to {nats_url}: {e}"),
        })?;
    info!("NATS connection established");

    // 7. Start the scheduled jobs.
    let graphite = config.graphite.enabled.then(|| {
        GraphitePublisher::new(
            client.clone(),
            config.graphite.prefix.clone(),
            config.graphite.subject.clone(),
        )
    });
    let schedule = Schedule::from_config(&config.statistics, &config.reaper);
    let jobs = scheduler::spawn_jobs(&ctx, &schedule, graphite);

    // 8. Subscribe and ingest until the feed ends.
    let messages = ingest::subscribe(client, &config.feed).await?;
    let feed = FeedIngest::new(ctx.dispatcher(), config.feed.on_decode_error);

    let result = tokio::select! {
        res = feed.run(messages) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            Ok(())
        }
    };

    for job in jobs {
        job.abort();
    }
    observer.abort();

    if let Err(e) = result {
        error!(error = %e, "feed ingestion stopped");
        return Err(e.into());
    }
    info!("berth-engine shutdown complete");
    Ok(())
}

/// First CLI argument, else `BERTH_CONFIG`, else [`DEFAULT_CONFIG_PATH`].
fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("BERTH_CONFIG"))
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load configuration from `path`. A missing file is an error rather
/// than a silent switch to defaults.
fn load_config(path: &Path) -> Result<BerthConfig, EngineError> {
    Ok(BerthConfig::from_file(path)?)
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Logging {
        message: format!("{e}"),
    })
}
