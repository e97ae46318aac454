//! Web server using Axum.

use axum::extract::DefaultBodyLimit;
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::router::{create_app_router, AppState};
use crate::error::{Error, Result};

/// Largest accepted request body; inbound chat events are small.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Web server configuration.
pub struct WebServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            port: 3008,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Run the web server until `shutdown` resolves.
pub async fn run_server<F>(config: WebServerConfig, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app_router(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Web(format!("Invalid address: {}", e)))?;

    tracing::info!("Starting web server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
