//! Messaging transports.
//!
//! A transport delivers inbound chat events to the relay and exposes the
//! three capabilities the pipeline needs: identity lookup, presence, and
//! sending replies back to a conversation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::core::ConversationKey;

pub mod gateway;
pub mod telegram;

pub use gateway::GatewayTransport;
pub use telegram::TelegramTransport;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// One result row of an identity lookup.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Canonical routable identifier, if the lookup found one.
    #[serde(alias = "jid")]
    pub canonical: Option<String>,
}

/// A single outbound text message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Presence states the relay emits.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Composing,
}

/// Capabilities of a messaging transport used by the relay pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logs.
    fn name(&self) -> &str;

    /// Resolve a raw identifier. An empty list means "unknown".
    async fn lookup_identity(&self, raw: &str) -> Result<Vec<IdentityRecord>>;

    /// Show a presence indicator in the conversation.
    async fn send_presence(&self, key: &ConversationKey, presence: Presence) -> Result<()>;

    /// Deliver messages to the conversation.
    async fn send_messages(&self, key: &ConversationKey, messages: &[OutboundMessage])
        -> Result<()>;
}

/// An inbound chat event, immutable once built.
#[derive(Clone)]
pub struct InboundMessage {
    pub key: ConversationKey,
    pub raw_identifier: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub transport: Arc<dyn Transport>,
}

impl InboundMessage {
    /// Build a message whose conversation key is the raw sender identifier.
    pub fn new(sender: &str, body: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            key: ConversationKey::new(sender),
            raw_identifier: sender.to_string(),
            body: body.to_string(),
            received_at: Utc::now(),
            transport,
        }
    }

    /// Time since the message reached the relay.
    pub fn age(&self) -> std::time::Duration {
        (Utc::now() - self.received_at).to_std().unwrap_or_default()
    }
}

impl std::fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundMessage")
            .field("key", &self.key)
            .field("raw_identifier", &self.raw_identifier)
            .field("body", &self.body)
            .field("received_at", &self.received_at)
            .field("transport", &self.transport.name())
            .finish()
    }
}
