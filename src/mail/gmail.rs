//! Gmail REST API mail source.
//!
//! Each search exchanges the user's OAuth refresh token for an access token,
//! lists matching message ids, and fetches each message in full. Bodies
//! arrive base64url-encoded; the text/plain part is preferred and the
//! text/html part kept alongside for fallback stripping.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{EmailMessage, MailError, MailQuery, MailSource};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail REST API client holding the OAuth application credentials.
///
/// Per-user refresh tokens are passed per call, so one client serves every
/// user in a batch.
#[derive(Debug, Clone)]
pub struct GmailClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl GmailClient {
    /// Create a client with the OAuth application credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
            client_secret,
        }
    }

    /// Exchange a refresh token for a short-lived access token.
    async fn access_token(&self, refresh_token: &str) -> Result<String, MailError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.client.post(TOKEN_URL).form(&form).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| MailError::Parse(e.to_string()))?;
        match parsed.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(MailError::Token(format!(
                "status {status}: {}",
                parsed
                    .error_description
                    .or(parsed.error)
                    .unwrap_or_else(|| "no access token in response".to_owned())
            ))),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(String, String)],
    ) -> Result<T, MailError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(MailError::Status {
                status,
                body: body.chars().take(200).collect(),
            });
        }
        serde_json::from_str(&body).map_err(|e| MailError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MailSource for GmailClient {
    async fn search(
        &self,
        refresh_token: &str,
        query: &MailQuery,
    ) -> Result<Vec<EmailMessage>, MailError> {
        let access_token = self.access_token(refresh_token).await?;

        let list: MessageList = self
            .get_json(
                &format!("{API_BASE}/messages"),
                &access_token,
                &[
                    ("q".to_owned(), query.query.clone()),
                    ("maxResults".to_owned(), query.max_results.to_string()),
                ],
            )
            .await?;

        debug!(count = list.messages.len(), "gmail search listed messages");

        let mut emails = Vec::new();
        for reference in &list.messages {
            let full: FullMessage = match self
                .get_json(
                    &format!("{API_BASE}/messages/{}", reference.id),
                    &access_token,
                    &[("format".to_owned(), "full".to_owned())],
                )
                .await
            {
                Ok(message) => message,
                Err(e) => {
                    // One unreadable message never fails the whole scan.
                    warn!(message_id = %reference.id, error = %e, "skipping unreadable message");
                    continue;
                }
            };
            emails.push(into_email(full));
        }
        Ok(emails)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FullMessage {
    id: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<Payload>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

fn into_email(message: FullMessage) -> EmailMessage {
    let payload = &message.payload;
    let subject = header_value(&payload.headers, "Subject").unwrap_or_else(|| "No Subject".to_owned());
    let from = header_value(&payload.headers, "From").unwrap_or_else(|| "Unknown".to_owned());
    let date = header_value(&payload.headers, "Date").unwrap_or_default();

    // Single-part messages carry the body at the top level; multipart
    // messages nest it under parts (possibly several levels down).
    let top_level = payload.body.as_ref().and_then(|b| b.data.as_deref());
    let (body_text, body_html) = match (top_level, payload.mime_type.as_deref()) {
        (Some(data), Some("text/html")) => (None, decode_body(data)),
        (Some(data), _) => (decode_body(data), None),
        _ => (
            find_part_data(payload, "text/plain").and_then(|d| decode_body(d)),
            find_part_data(payload, "text/html").and_then(|d| decode_body(d)),
        ),
    };

    EmailMessage {
        id: message.id,
        subject,
        from,
        date,
        body_text,
        body_html,
    }
}

fn header_value(headers: &[Header], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

fn find_part_data<'a>(payload: &'a Payload, mime: &str) -> Option<&'a str> {
    for part in &payload.parts {
        if part.mime_type.as_deref() == Some(mime) {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                return Some(data);
            }
        }
        if let Some(data) = find_part_data(part, mime) {
            return Some(data);
        }
    }
    None
}

fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
