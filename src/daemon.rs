//! Relay daemon: wires settings, backend, queue, transport and web server.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::create_backend;
use crate::config::{Settings, TransportKind};
use crate::core::{ConversationPipeline, EventIntake, TaskQueue};
use crate::error::{Error, Result};
use crate::transport::telegram::run_telegram_intake;
use crate::transport::{GatewayTransport, TelegramTransport, Transport};
use crate::web::{run_server, AppState, WebServerConfig};

/// How long shutdown waits for in-flight conversations to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Build the intake pipeline described by the settings.
pub fn build_intake(settings: &Settings) -> Result<EventIntake> {
    let backend = create_backend(settings)?;
    let pipeline = ConversationPipeline::from_settings(settings, backend);
    Ok(EventIntake::new(TaskQueue::new(Arc::new(pipeline))))
}

/// Run the relay until Ctrl-C.
pub async fn run_relay_daemon(settings: Settings) -> Result<()> {
    settings.validate()?;

    let intake = build_intake(&settings)?;

    let mut telegram = None;
    let webhook_transport: Option<Arc<dyn Transport>> = match settings.transport.kind {
        TransportKind::Gateway => {
            let url = settings
                .transport
                .gateway_url
                .clone()
                .ok_or_else(|| Error::Config("transport.gateway_url is not set".to_string()))?;
            tracing::info!(gateway = %url, "Using gateway transport");
            Some(Arc::new(GatewayTransport::new(url)))
        }
        TransportKind::Telegram => {
            let token = settings
                .transport
                .telegram_token
                .clone()
                .ok_or_else(|| Error::Config("transport.telegram_token is not set".to_string()))?;
            let mut transport = TelegramTransport::new(token);
            if let Some(api_url) = settings.transport.telegram_api_url()? {
                tracing::info!(api_url = %api_url, "Using custom Telegram Bot API server");
                transport = transport.with_api_url(api_url);
            }
            telegram = Some(Arc::new(transport));
            None
        }
    };

    let state = AppState {
        intake: intake.clone(),
        webhook_transport,
    };
    let config = WebServerConfig {
        port: settings.server.port,
        host: settings.server.host.clone(),
    };

    let server = run_server(config, state, shutdown_signal());
    match telegram {
        Some(transport) => {
            // Either side failing to start ends the daemon right away.
            tokio::pin!(server);
            tokio::select! {
                biased;
                served = &mut server => served?,
                polled = run_telegram_intake(transport, intake.clone()) => {
                    polled?;
                    server.await?;
                }
            }
        }
        None => server.await?,
    }

    tracing::info!("Waiting for conversation queues to drain...");
    match tokio::time::timeout(SHUTDOWN_GRACE, intake.queue().idle()).await {
        Ok(()) => tracing::info!("All conversation queues drained"),
        Err(_) => {
            let stats = intake.queue().stats().await;
            tracing::warn!(
                pending = stats.pending,
                active_keys = stats.active_keys,
                "Shutting down with unfinished conversations"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
