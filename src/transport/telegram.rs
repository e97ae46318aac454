//! Telegram transport - simple long-polling version.

use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ChatAction;

use super::{
    IdentityRecord, InboundMessage, OutboundMessage, Presence, Result, Transport, TransportError,
};
use crate::core::{ConversationKey, EventIntake};

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            bot: Bot::new(token.into()),
        }
    }

    /// Point the bot at a self-hosted Bot API server.
    pub fn with_api_url(mut self, api_url: reqwest::Url) -> Self {
        self.bot = self.bot.set_api_url(api_url);
        self
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }
}

/// Telegram conversation keys are chat ids.
fn chat_id(key: &ConversationKey) -> Result<ChatId> {
    key.as_str()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| TransportError::Rejected(format!("Not a Telegram chat id: {}", key)))
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    // Telegram ids are already stable, there is nothing to resolve.
    async fn lookup_identity(&self, raw: &str) -> Result<Vec<IdentityRecord>> {
        Ok(vec![IdentityRecord {
            canonical: Some(raw.to_string()),
        }])
    }

    async fn send_presence(&self, key: &ConversationKey, presence: Presence) -> Result<()> {
        let action = match presence {
            Presence::Composing => ChatAction::Typing,
        };
        self.bot
            .send_chat_action(chat_id(key)?, action)
            .await
            .map_err(|e| TransportError::Telegram(e.to_string()))?;
        Ok(())
    }

    async fn send_messages(
        &self,
        key: &ConversationKey,
        messages: &[OutboundMessage],
    ) -> Result<()> {
        let chat = chat_id(key)?;
        for message in messages {
            self.bot
                .send_message(chat, &message.body)
                .await
                .map_err(|e| TransportError::Telegram(e.to_string()))?;
        }
        Ok(())
    }
}

/// Run the Telegram long-poll loop, feeding every text message to intake.
///
/// The bot is checked with `getMe` first, so a bad token or an unreachable
/// Bot API is reported as an error instead of aborting the dispatcher.
pub async fn run_telegram_intake(transport: Arc<TelegramTransport>, intake: EventIntake) -> Result<()> {
    tracing::info!("Starting Telegram intake...");

    let bot = transport.bot();
    let me = bot
        .get_me()
        .await
        .map_err(|e| TransportError::Telegram(format!("Bot API check failed: {}", e)))?;
    tracing::info!(bot = %me.username(), "Connected to Telegram");

    let transport: Arc<dyn Transport> = transport;

    teloxide::repl(bot, move |msg: Message| {
        let intake = intake.clone();
        let transport = transport.clone();
        async move {
            if let Some(text) = msg.text() {
                let sender = msg.chat.id.0.to_string();
                intake.accept(InboundMessage::new(&sender, text, transport)).await;
            }
            respond(())
        }
    })
    .await;

    tracing::info!("Telegram intake stopped");
    Ok(())
}
