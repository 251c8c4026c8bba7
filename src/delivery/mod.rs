//! Outbound message delivery.
//!
//! Fire-and-forget: the pipeline hands a destination and a message to the
//! channel and reports the outcome, but never retries — a failed send is
//! recorded in the run result without invalidating the composed content.

use async_trait::async_trait;

pub mod telegram;

/// Confirmation of a delivered message.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReceipt {
    /// Channel-assigned message identifier, when the channel reports one.
    pub message_id: Option<String>,
}

/// Errors from message delivery.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The destination identifier is missing or malformed.
    #[error("invalid delivery destination: {0}")]
    InvalidDestination(String),
    /// The channel rejected or failed the send.
    #[error("send failed: {0}")]
    Send(String),
}

/// A channel that can deliver one message to one destination.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Send `message` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the destination is unusable or the
    /// channel fails the send.
    async fn deliver(
        &self,
        destination: &str,
        message: &str,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}
