//! Query server lifecycle.
//!
//! [`start_server`] binds the configured address and serves the router
//! until the task is aborted or the runtime shuts down. [`bind_listener`]
//! and [`serve`] split the two steps so a caller can fail fast on bind.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Where the query server listens.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl ServerConfig {
    /// Parse `host:port` into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

/// Start the query server.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server hits a
/// fatal I/O error.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind_listener(config).await?;
    serve(listener, state).await
}

/// Bind the configured address.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or in use.
pub async fn bind_listener(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = config.socket_addr()?;
    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve the router on an already bound listener.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] on a fatal I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "query server listening");
    }

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Errors that can occur when starting or running the query server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
