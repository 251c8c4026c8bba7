//! Language model access.
//!
//! Defines the narrow [`LanguageModel`] trait shared by the two places the
//! pipeline talks to a hosted model: the query analyzer (strict-JSON output)
//! and the response composer (free text). Schema validation of JSON-producing
//! calls happens on the caller side, so implementations stay interchangeable
//! and tests can substitute a deterministic scripted model.
//!
//! One provider is implemented: [`openai::OpenAiModel`] against the
//! `/v1/chat/completions` API.

use async_trait::async_trait;
use regex::Regex;

pub mod openai;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A single-prompt completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The full prompt, sent as one user message.
    pub prompt: String,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionRequest {
    /// Build a request with the given prompt and bounds.
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by model providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP transport failure.
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Response did not match the expected schema.
    #[error("provider response parse error: {0}")]
    Parse(String),
    /// Upstream provider responded with an error status.
    #[error("provider returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body, sanitized and truncated.
        body: String,
    },
    /// The response contained no usable completion.
    #[error("provider returned an empty response")]
    Empty,
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns `ProviderError::Request` on transport failure, `ProviderError::HttpStatus` on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [r"sk-[A-Za-z0-9_\-]{20,}", r"Bearer [A-Za-z0-9_\-\.]{20,}"] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Core language model interface.
///
/// Implementations must be `Send + Sync` to allow use across async task
/// boundaries in concurrent per-user pipeline runs.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Request a completion and return its text.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on API, network, or parse failure.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}
