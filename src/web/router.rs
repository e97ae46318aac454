//! Route definitions for web server.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::{EventIntake, QueueStats};
use crate::transport::{InboundMessage, Transport};

/// Shared state of the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    pub intake: EventIntake,
    /// Transport replies go out through for `/webhook` events. `None` when
    /// the relay is fed by another transport.
    pub webhook_transport: Option<Arc<dyn Transport>>,
}

/// Inbound event posted by the gateway.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub from: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Serialize)]
struct WebhookAck {
    queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending: Option<usize>,
}

#[derive(Debug, Serialize)]
struct QueuesView {
    #[serde(flatten)]
    stats: QueueStats,
    keys: Vec<String>,
}

/// Create the API router.
pub fn create_api_router() -> Router<AppState> {
    Router::new().route("/queues", get(list_queues))
}

/// Create the full app router.
pub fn create_app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", create_api_router())
        .route("/webhook", post(webhook))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

async fn webhook(State(state): State<AppState>, Json(event): Json<WebhookEvent>) -> Response {
    let Some(transport) = state.webhook_transport.clone() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "webhook intake is not enabled for this transport",
        )
            .into_response();
    };

    let message = InboundMessage::new(&event.from, &event.body, transport);
    let ack = match state.intake.accept(message).await {
        Some(enqueued) => WebhookAck {
            queued: true,
            pending: Some(enqueued.pending),
        },
        None => WebhookAck {
            queued: false,
            pending: None,
        },
    };

    (StatusCode::ACCEPTED, Json(ack)).into_response()
}

async fn list_queues(State(state): State<AppState>) -> Json<QueuesView> {
    let queue = state.intake.queue();
    let view = QueuesView {
        stats: queue.stats().await,
        keys: queue
            .active_keys()
            .await
            .into_iter()
            .map(|k| k.to_string())
            .collect(),
    };
    Json(view)
}
