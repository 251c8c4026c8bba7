//! Telegram delivery channel.
//!
//! Sends the composed message to the user's Telegram chat with Markdown
//! formatting, matching how the recommendations read best in the app.

use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::debug;

use super::{DeliveryChannel, DeliveryError, DeliveryReceipt};

/// Delivery channel backed by a Telegram bot.
#[derive(Clone)]
pub struct TelegramDelivery {
    bot: Bot,
}

impl TelegramDelivery {
    /// Create a channel from a bot token.
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
        }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramDelivery {
    async fn deliver(
        &self,
        destination: &str,
        message: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let chat_id: i64 = destination
            .trim()
            .parse()
            .map_err(|_| DeliveryError::InvalidDestination(destination.to_owned()))?;

        let sent = self
            .bot
            .send_message(ChatId(chat_id), message)
            .parse_mode(ParseMode::Markdown)
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))?;

        debug!(chat_id, message_id = sent.id.0, "telegram message delivered");
        Ok(DeliveryReceipt {
            message_id: Some(sent.id.0.to_string()),
        })
    }
}
