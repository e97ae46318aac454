//! HTTP gateway transport.
//!
//! Talks to a chat provider running as a sidecar process. Inbound events
//! reach the relay through the `/webhook` route of the web server; this
//! type covers the outbound half.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{IdentityRecord, OutboundMessage, Presence, Result, Transport, TransportError};
use crate::core::ConversationKey;

pub struct GatewayTransport {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    messages: &'a [OutboundMessage],
}

#[derive(Serialize)]
struct PresenceRequest<'a> {
    to: &'a str,
    state: Presence,
}

impl GatewayTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(TransportError::Rejected(format!("HTTP {}: {}", status, text)))
    }
}

#[async_trait]
impl Transport for GatewayTransport {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn lookup_identity(&self, raw: &str) -> Result<Vec<IdentityRecord>> {
        let response = self
            .client
            .get(format!("{}/lookup", self.base_url))
            .query(&[("id", raw)])
            .send()
            .await?;

        let records: Vec<IdentityRecord> = Self::check(response).await?.json().await?;
        Ok(records)
    }

    async fn send_presence(&self, key: &ConversationKey, presence: Presence) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/presence", self.base_url))
            .json(&PresenceRequest {
                to: key.as_str(),
                state: presence,
            })
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn send_messages(
        &self,
        key: &ConversationKey,
        messages: &[OutboundMessage],
    ) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&SendRequest {
                to: key.as_str(),
                messages,
            })
            .send()
            .await?;

        Self::check(response).await?;
        tracing::debug!(key = %key, count = messages.len(), "Gateway accepted messages");
        Ok(())
    }
}
