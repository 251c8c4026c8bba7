//! Mail retrieval interface and booking search query construction.
//!
//! The pipeline only needs one capability from a mailbox: run a
//! subject/date-scoped search and hand back messages with their plain-text
//! bodies (derived from HTML when necessary). [`gmail::GmailClient`]
//! implements the trait against the Gmail REST API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::classifier::html;

pub mod gmail;

/// A retrieved email message.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Provider message identifier.
    pub id: String,
    /// Subject header.
    pub subject: String,
    /// From header.
    pub from: String,
    /// Date header.
    pub date: String,
    /// Plain-text body part, if present.
    pub body_text: Option<String>,
    /// HTML body part, if present.
    pub body_html: Option<String>,
}

impl EmailMessage {
    /// The plain-text body, derived from the HTML part when no text part
    /// exists. Empty when the message had no body at all.
    pub fn plain_text(&self) -> String {
        if let Some(text) = &self.body_text {
            if !text.trim().is_empty() {
                return text.clone();
            }
        }
        self.body_html
            .as_deref()
            .map(html::html_to_text)
            .unwrap_or_default()
    }
}

/// A subject/date-scoped mailbox search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailQuery {
    /// Provider search expression.
    pub query: String,
    /// Maximum messages to return.
    pub max_results: u32,
}

/// Errors from mail retrieval.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// HTTP transport failure.
    #[error("mail request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Provider responded with an error status.
    #[error("mail api returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// OAuth token exchange failed.
    #[error("token exchange failed: {0}")]
    Token(String),
    /// Response body did not match the expected shape.
    #[error("mail response parse error: {0}")]
    Parse(String),
}

/// Read-only mailbox access scoped to one user credential.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Run a search and return the matching messages with bodies.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] on credential or transport failure.
    async fn search(
        &self,
        refresh_token: &str,
        query: &MailQuery,
    ) -> Result<Vec<EmailMessage>, MailError>;
}

/// Build the taste-scoped booking search, or `None` when the user has no
/// taste that maps to a search term.
///
/// Terms mirror the subject lines of the booking mails each taste attracts;
/// the date bound keeps the scan to the recent window.
pub fn booking_search_query(
    tastes: &[String],
    now: DateTime<Utc>,
    window_days: i64,
    max_results: u32,
) -> Option<MailQuery> {
    let tastes_lower: Vec<String> = tastes.iter().map(|t| t.trim().to_lowercase()).collect();
    let has = |tag: &str| tastes_lower.iter().any(|t| t == tag);

    let mut terms: Vec<&str> = Vec::new();
    if has("movie") {
        terms.extend(["Showtime!", "\"movie ticket\""]);
    }
    if has("travel") {
        terms.extend([
            "\"Booking Confirmation on IRCTC\"",
            "\"e-ticket\"",
            "\"eticket\"",
            "\"flight booking\"",
            "\"hotel booking\"",
            "\"travel booking\"",
        ]);
    }
    if has("dining") {
        terms.extend([
            "\"restaurant booking\"",
            "\"dining reservation\"",
            "\"table reservation\"",
        ]);
    }
    if has("book") {
        terms.push("\"book confirmation\"");
    }

    if terms.is_empty() {
        return None;
    }

    let after = now
        .checked_sub_signed(chrono::Duration::days(window_days))
        .unwrap_or(now)
        .format("%Y-%m-%d");

    Some(MailQuery {
        query: format!("subject:({}) after:{after}", terms.join(" OR ")),
        max_results,
    })
}
