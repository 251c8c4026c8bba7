//! SQLite-backed preference store and message log.
//!
//! One small database, two tables: `users` holds profiles keyed by user id,
//! `messages` appends every delivered message with its timestamp. Schema is
//! created on open so a fresh deployment needs no migration step.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use super::{MessageLog, PreferenceStore, StoreError, UserProfile};

/// SQLite store implementing both persistence interfaces.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

/// One delivered message from the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    /// Message text as delivered.
    pub message: String,
    /// RFC 3339 delivery timestamp.
    pub delivered_at: String,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and ensure schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the parent directory cannot be created or
    /// the database cannot be opened.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Setup(format!(
                        "failed to create data directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(path = %path.display(), "sqlite store opened");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                email TEXT NOT NULL DEFAULT '',
                tastes TEXT NOT NULL DEFAULT '',
                telegram_chat_id TEXT,
                gmail_refresh_token TEXT,
                active INTEGER NOT NULL DEFAULT 1
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                message TEXT NOT NULL,
                delivered_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a user profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn upsert_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (user_id, email, tastes, telegram_chat_id, gmail_refresh_token, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                email = excluded.email,
                tastes = excluded.tastes,
                telegram_chat_id = excluded.telegram_chat_id,
                gmail_refresh_token = excluded.gmail_refresh_token,
                active = excluded.active",
        )
        .bind(&profile.user_id)
        .bind(&profile.email)
        .bind(profile.tastes.join(","))
        .bind(&profile.telegram_chat_id)
        .bind(&profile.gmail_refresh_token)
        .bind(profile.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent delivered messages for one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    pub async fn recent_messages(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<DeliveredMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT message, delivered_at FROM messages
             WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DeliveredMessage {
                    message: row.try_get("message")?,
                    delivered_at: row.try_get("delivered_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PreferenceStore for SqliteStore {
    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, email, tastes, telegram_chat_id, gmail_refresh_token, active
             FROM users ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let tastes: String = row.try_get("tastes")?;
                Ok(UserProfile {
                    user_id: row.try_get("user_id")?,
                    email: row.try_get("email")?,
                    tastes: tastes
                        .split(',')
                        .map(|t| t.trim().to_lowercase())
                        .filter(|t| !t.is_empty())
                        .collect(),
                    telegram_chat_id: row.try_get("telegram_chat_id")?,
                    gmail_refresh_token: row.try_get("gmail_refresh_token")?,
                    active: row.try_get("active")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl MessageLog for SqliteStore {
    async fn record_delivery(&self, user_id: &str, message: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO messages (user_id, message, delivered_at) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(message)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
