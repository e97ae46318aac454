//! Conversation pipeline: resolve the sender, ask the backend, deliver one reply.

use async_trait::async_trait;
use std::sync::Arc;

use super::identity::IdentityResolver;
use crate::backend::BackendRelay;
use crate::config::{Settings, DEFAULT_FALLBACK_TEXT};
use crate::transport::{InboundMessage, OutboundMessage, Presence};

/// A captured inbound message waiting in a conversation queue.
#[derive(Debug)]
pub struct QueuedTask {
    /// Unique ID (ULID)
    pub id: String,
    pub message: InboundMessage,
}

impl QueuedTask {
    pub fn new(message: InboundMessage) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            message,
        }
    }
}

/// How a processed task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The backend reply was delivered.
    Delivered,
    /// The backend failed and the fallback text was delivered instead.
    DeliveredFallback,
}

/// Unit of work run by the task queue for every dequeued task.
///
/// Implementations must not fail: every error is handled inside `process`.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, task: QueuedTask) -> PipelineOutcome;
}

/// Identity resolution + backend relay + exactly one delivery.
pub struct ConversationPipeline {
    resolver: IdentityResolver,
    backend: Arc<dyn BackendRelay>,
    fallback_text: String,
}

impl ConversationPipeline {
    pub fn new(resolver: IdentityResolver, backend: Arc<dyn BackendRelay>) -> Self {
        Self {
            resolver,
            backend,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings, backend: Arc<dyn BackendRelay>) -> Self {
        Self::new(
            IdentityResolver::new(settings.identity.lookup_timeout()),
            backend,
        )
        .with_fallback_text(settings.replies.fallback_text.clone())
    }

    pub fn with_fallback_text(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = text.into();
        self
    }
}

#[async_trait]
impl TaskProcessor for ConversationPipeline {
    async fn process(&self, task: QueuedTask) -> PipelineOutcome {
        let QueuedTask { id, message } = task;
        let transport = &message.transport;
        let key = &message.key;

        if let Err(e) = transport.send_presence(key, Presence::Composing).await {
            tracing::debug!(key = %key, error = %e, "Presence update failed");
        }

        let identifier = self
            .resolver
            .resolve(&message.raw_identifier, transport)
            .await;

        let (reply, outcome) = match self.backend.relay(&identifier, &message.body).await {
            Ok(reply) => (reply, PipelineOutcome::Delivered),
            Err(e) => {
                tracing::error!(
                    key = %key,
                    task_id = %id,
                    identifier = %identifier,
                    error = %e,
                    "Backend call failed, sending fallback reply"
                );
                (self.fallback_text.clone(), PipelineOutcome::DeliveredFallback)
            }
        };

        if let Err(e) = transport
            .send_messages(key, &[OutboundMessage::text(reply)])
            .await
        {
            tracing::error!(key = %key, task_id = %id, error = %e, "Failed to deliver reply");
        } else {
            tracing::debug!(
                key = %key,
                task_id = %id,
                ?outcome,
                latency_ms = message.age().as_millis() as u64,
                "Reply delivered"
            );
        }

        outcome
    }
}
