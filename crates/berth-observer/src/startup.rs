//! Background launch of the query server.
//!
//! The engine binary awaits [`spawn_observer`] during startup so the HTTP
//! API runs alongside ingestion and the scheduled jobs.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, bind_listener, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the query server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind the query server, then serve it on a background Tokio task.
///
/// The listener is bound before the task is spawned, so a bad or busy
/// address fails startup. Errors while serving are logged from the task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot
/// be bound.
pub async fn spawn_observer(
    config: ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let listener = bind_listener(&config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "query server exited with error");
        }
    });

    tracing::info!(%addr, "query server spawned on background task");

    Ok(handle)
}
