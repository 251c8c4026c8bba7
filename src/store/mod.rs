//! User preference and message persistence.
//!
//! Two narrow interfaces: [`PreferenceStore`] supplies per-user profiles
//! (taste preferences, delivery destination, mail credential) read-only to
//! the batch entry points, and [`MessageLog`] records every delivered
//! message so users keep a history. [`sqlite::SqliteStore`] implements both.

use async_trait::async_trait;

pub mod sqlite;

/// One user's profile as the batch entry points consume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Stable user identifier.
    pub user_id: String,
    /// Account email address.
    pub email: String,
    /// Enabled taste preference tags (lowercased).
    pub tastes: Vec<String>,
    /// Telegram chat id for delivery, when connected.
    pub telegram_chat_id: Option<String>,
    /// Gmail refresh token, when the mailbox is connected.
    pub gmail_refresh_token: Option<String>,
    /// Whether the account participates in scheduled runs.
    pub active: bool,
}

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Database file or directory could not be prepared.
    #[error("store setup failed: {0}")]
    Setup(String),
}

/// Read-only access to user profiles.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// List every stored user profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError>;
}

/// Append-only record of delivered messages.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Record one delivered message for a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn record_delivery(&self, user_id: &str, message: &str) -> Result<(), StoreError>;
}
