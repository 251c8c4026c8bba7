//! HTTP client for the cultural recommendation API.
//!
//! Covers the four endpoints the pipeline consumes: entity search
//! (`/search`), tag search (`/v2/tags`), audience search (`/v2/audiences`),
//! and recommendations (`/v2/insights/`). The search side is exposed through
//! the [`CulturalSearch`] trait and the recommendation side through
//! [`RecommendationSource`], so the resolver and fetcher stages can be
//! exercised against in-memory fakes.
//!
//! Only the recommendation fetch retries: HTTP 429 is backed off
//! exponentially via [`retry::with_rate_limit_retry`]; every other non-2xx
//! fails immediately with the response's message body.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::analyzer::{AudienceParentType, EntityType};
use crate::params::InsightsParams;

pub mod retry;

pub use retry::RetryPolicy;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the recommendation API client.
#[derive(Debug, thiserror::Error)]
pub enum QlooError {
    /// HTTP transport failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Upstream responded with an error status.
    #[error("api returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// Rate limited on every attempt; the retry budget is exhausted.
    #[error("rate limited after {attempts} attempts")]
    RateLimited {
        /// Total attempts made.
        attempts: u32,
    },
    /// Response body did not match the expected shape.
    #[error("response parse error: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// A ranked candidate returned by one of the search endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Opaque vendor identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// One simplified recommendation entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    /// Entity name.
    pub name: String,
    /// Entity description; a stock placeholder when the vendor has none.
    pub description: String,
    /// Street address, when present and non-blank.
    pub address: Option<String>,
}

/// Placeholder used when a recommendation entity carries no description.
pub const NO_DESCRIPTION: &str = "No description available";

// ---------------------------------------------------------------------------
// Trait seams
// ---------------------------------------------------------------------------

/// Search endpoints used by the identifier resolver.
#[async_trait]
pub trait CulturalSearch: Send + Sync {
    /// Type-scoped entity search.
    async fn search_entities(
        &self,
        query: &str,
        entity_type: EntityType,
        limit: u32,
    ) -> Result<Vec<SearchHit>, QlooError>;

    /// Unscoped tag search.
    async fn search_tags(&self, query: &str, take: u32) -> Result<Vec<SearchHit>, QlooError>;

    /// Audience search scoped by parent type.
    async fn audiences_by_parent(
        &self,
        parent: AudienceParentType,
        take: u32,
    ) -> Result<Vec<SearchHit>, QlooError>;

    /// Unscoped audience listing (last-resort broadening).
    async fn audiences_unscoped(&self, take: u32) -> Result<Vec<SearchHit>, QlooError>;
}

/// The recommendation endpoint used by the fetch stage.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    /// Fetch recommendations for a mapped parameter set.
    ///
    /// An empty result list is a legitimate outcome, not an error.
    async fn fetch_insights(
        &self,
        params: &InsightsParams,
    ) -> Result<Vec<Recommendation>, QlooError>;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Reqwest-backed client for the recommendation API.
#[derive(Debug, Clone)]
pub struct QlooClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl QlooClient {
    /// Create a client for the given base URL (no trailing slash) and key.
    pub fn new(base_url: String, api_key: String, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            retry,
        }
    }

    /// Issue one GET and return `(status, body)`.
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<(u16, String), QlooError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Issue one GET, mapping any non-2xx status to [`QlooError::Status`].
    async fn get_ok(&self, path: &str, query: &[(String, String)]) -> Result<String, QlooError> {
        let (status, body) = self.get(path, query).await?;
        if !(200..300).contains(&status) {
            return Err(QlooError::Status {
                status,
                message: extract_error_message(&body),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl CulturalSearch for QlooClient {
    async fn search_entities(
        &self,
        query: &str,
        entity_type: EntityType,
        limit: u32,
    ) -> Result<Vec<SearchHit>, QlooError> {
        let pairs = vec![
            ("query".to_owned(), query.to_owned()),
            ("limit".to_owned(), limit.to_string()),
            ("types".to_owned(), entity_type.urn()),
        ];
        let body = self.get_ok("/search", &pairs).await?;
        parse_entity_search(&body)
    }

    async fn search_tags(&self, query: &str, take: u32) -> Result<Vec<SearchHit>, QlooError> {
        let pairs = vec![
            ("filter.query".to_owned(), query.to_owned()),
            ("take".to_owned(), take.to_string()),
        ];
        let body = self.get_ok("/v2/tags", &pairs).await?;
        parse_tag_search(&body)
    }

    async fn audiences_by_parent(
        &self,
        parent: AudienceParentType,
        take: u32,
    ) -> Result<Vec<SearchHit>, QlooError> {
        let pairs = vec![
            ("filter.parents.types".to_owned(), parent.urn().to_owned()),
            ("take".to_owned(), take.to_string()),
        ];
        let body = self.get_ok("/v2/audiences", &pairs).await?;
        parse_audience_search(&body)
    }

    async fn audiences_unscoped(&self, take: u32) -> Result<Vec<SearchHit>, QlooError> {
        let pairs = vec![("take".to_owned(), take.to_string())];
        let body = self.get_ok("/v2/audiences", &pairs).await?;
        parse_audience_search(&body)
    }
}

#[async_trait]
impl RecommendationSource for QlooClient {
    async fn fetch_insights(
        &self,
        params: &InsightsParams,
    ) -> Result<Vec<Recommendation>, QlooError> {
        let pairs = params.to_query_pairs();
        retry::with_rate_limit_retry(&self.retry, |attempt| {
            let pairs = pairs.clone();
            async move {
                debug!(attempt, "calling insights endpoint");
                let (status, body) = self.get("/v2/insights/", &pairs).await?;
                if !(200..300).contains(&status) {
                    return Err(QlooError::Status {
                        status,
                        message: extract_error_message(&body),
                    });
                }
                parse_insights(&body)
            }
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Wire parsing (pub for integration testing)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EntitySearchResponse {
    #[serde(default)]
    results: Vec<WireHit>,
}

#[derive(Debug, Deserialize)]
struct WireHit {
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl WireHit {
    fn into_hit(self) -> Option<SearchHit> {
        let id = self.entity_id.or(self.id)?;
        if id.trim().is_empty() {
            return None;
        }
        Some(SearchHit {
            id,
            name: self.name.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TagSearchResponse {
    #[serde(default)]
    results: TagResults,
}

#[derive(Debug, Default, Deserialize)]
struct TagResults {
    #[serde(default)]
    tags: Vec<WireHit>,
}

#[derive(Debug, Deserialize)]
struct AudienceSearchResponse {
    #[serde(default)]
    results: AudienceResults,
}

#[derive(Debug, Default, Deserialize)]
struct AudienceResults {
    #[serde(default)]
    audiences: Vec<WireHit>,
}

#[derive(Debug, Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    results: InsightsResults,
}

#[derive(Debug, Default, Deserialize)]
struct InsightsResults {
    #[serde(default)]
    entities: Vec<WireInsightEntity>,
}

#[derive(Debug, Deserialize)]
struct WireInsightEntity {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    properties: WireProperties,
}

#[derive(Debug, Default, Deserialize)]
struct WireProperties {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

/// Parse an entity search response body.
///
/// # Errors
///
/// Returns [`QlooError::Parse`] on malformed JSON.
#[doc(hidden)]
pub fn parse_entity_search(body: &str) -> Result<Vec<SearchHit>, QlooError> {
    let response: EntitySearchResponse =
        serde_json::from_str(body).map_err(|e| QlooError::Parse(e.to_string()))?;
    Ok(response
        .results
        .into_iter()
        .filter_map(WireHit::into_hit)
        .collect())
}

/// Parse a tag search response body.
///
/// # Errors
///
/// Returns [`QlooError::Parse`] on malformed JSON.
#[doc(hidden)]
pub fn parse_tag_search(body: &str) -> Result<Vec<SearchHit>, QlooError> {
    let response: TagSearchResponse =
        serde_json::from_str(body).map_err(|e| QlooError::Parse(e.to_string()))?;
    Ok(response
        .results
        .tags
        .into_iter()
        .filter_map(WireHit::into_hit)
        .collect())
}

/// Parse an audience search response body.
///
/// # Errors
///
/// Returns [`QlooError::Parse`] on malformed JSON.
#[doc(hidden)]
pub fn parse_audience_search(body: &str) -> Result<Vec<SearchHit>, QlooError> {
    let response: AudienceSearchResponse =
        serde_json::from_str(body).map_err(|e| QlooError::Parse(e.to_string()))?;
    Ok(response
        .results
        .audiences
        .into_iter()
        .filter_map(WireHit::into_hit)
        .collect())
}

/// Parse an insights response body into simplified recommendations.
///
/// # Errors
///
/// Returns [`QlooError::Parse`] on malformed JSON.
#[doc(hidden)]
pub fn parse_insights(body: &str) -> Result<Vec<Recommendation>, QlooError> {
    let response: InsightsResponse =
        serde_json::from_str(body).map_err(|e| QlooError::Parse(e.to_string()))?;
    Ok(response
        .results
        .entities
        .into_iter()
        .map(|entity| {
            let address = entity
                .properties
                .address
                .filter(|address| !address.trim().is_empty());
            Recommendation {
                name: entity.name.unwrap_or_default(),
                description: entity
                    .properties
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
                address,
            }
        })
        .collect())
}

fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_owned();
            }
        }
    }
    body.chars().take(200).collect()
}
