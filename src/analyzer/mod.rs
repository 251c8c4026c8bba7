//! Query analysis: inspiration sentence → structured search intent.
//!
//! One language-model call with a strict output-shape instruction turns the
//! free-text inspiration sentence into a [`QueryDescriptor`]: target entity
//! type, keyword/category filters, interest tags, audience keywords, location
//! signal, and trend bias. Schema validation happens here, on the caller
//! side, so the model backend stays swappable.
//!
//! Two rules are contracts rather than model suggestions:
//! - genre/style terms are tags, demographic/lifestyle terms are audiences
//!   (each carrying a parent-type bucket);
//! - destination/place queries carry no audiences — the downstream API
//!   cannot use them, so they are force-cleared during validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::providers::{CompletionRequest, LanguageModel, ProviderError};

// ---------------------------------------------------------------------------
// Entity taxonomy
// ---------------------------------------------------------------------------

/// The fixed vendor entity taxonomy that scopes search and recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Musicians, bands, singers.
    Artist,
    /// Books, literature.
    Book,
    /// Companies, products, brands.
    Brand,
    /// Cities, countries, regions, travel destinations.
    Destination,
    /// Films, cinema.
    Movie,
    /// Celebrities, public figures.
    Person,
    /// Intra-city points of interest: attractions, restaurants, museums.
    Place,
    /// Podcasts, audio shows.
    Podcast,
    /// Television series.
    TvShow,
    /// Video games.
    Videogame,
}

impl EntityType {
    /// All recognized entity types, in the order the model prompt lists them.
    pub const ALL: [Self; 10] = [
        Self::Artist,
        Self::Book,
        Self::Brand,
        Self::Destination,
        Self::Movie,
        Self::Person,
        Self::Place,
        Self::Podcast,
        Self::TvShow,
        Self::Videogame,
    ];

    /// The bare taxonomy value (e.g. `tv_show`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Book => "book",
            Self::Brand => "brand",
            Self::Destination => "destination",
            Self::Movie => "movie",
            Self::Person => "person",
            Self::Place => "place",
            Self::Podcast => "podcast",
            Self::TvShow => "tv_show",
            Self::Videogame => "videogame",
        }
    }

    /// The fully-qualified URN (e.g. `urn:entity:tv_show`).
    pub fn urn(&self) -> String {
        format!("urn:entity:{}", self.as_str())
    }

    /// Parse a taxonomy value, tolerating a `urn:entity:` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::UnknownEntityType`] for unrecognized values.
    pub fn parse(s: &str) -> Result<Self, AnalysisError> {
        let bare = s.trim().strip_prefix("urn:entity:").unwrap_or(s.trim());
        Self::ALL
            .iter()
            .find(|t| t.as_str() == bare)
            .copied()
            .ok_or_else(|| AnalysisError::UnknownEntityType(s.to_owned()))
    }

    /// Whether the recommendation API accepts demographic audience signals
    /// for this entity type. Location-like types do not.
    pub fn supports_demographic_signals(&self) -> bool {
        !matches!(self, Self::Destination | Self::Place)
    }

    /// Whether the recommendation API accepts a trend bias for this entity
    /// type. Location-like types do not.
    pub fn supports_trend_bias(&self) -> bool {
        !matches!(self, Self::Destination | Self::Place)
    }
}

// ---------------------------------------------------------------------------
// Trend bias
// ---------------------------------------------------------------------------

/// Trend bias extracted from the inspiration sentence.
///
/// The model vocabulary is looser than the API's; synonyms are collapsed at
/// parse time (`low`/`very_low` → not-trending, `mid`/`medium` → slightly,
/// `high`/`very_high` → very) and anything unrecognized means "off".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBias {
    /// The user wants trending results.
    Trending,
    /// The user strongly wants trending results.
    VeryTrending,
    /// A mild preference for trending results.
    SlightlyTrending,
    /// The user explicitly does not want trending results.
    NotTrending,
    /// Trendiness was not mentioned.
    Off,
}

impl TrendBias {
    /// Collapse the loose wire vocabulary onto the five bias levels.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trending" => Self::Trending,
            "very_trending" | "high" | "very_high" => Self::VeryTrending,
            "slightly_trending" | "mid" | "medium" => Self::SlightlyTrending,
            "not_trending" | "low" | "very_low" => Self::NotTrending,
            _ => Self::Off,
        }
    }

    /// The accepted API level for this bias, or `None` when the bias should
    /// be omitted entirely.
    pub fn insights_level(&self) -> Option<&'static str> {
        match self {
            Self::Trending | Self::VeryTrending => Some("high"),
            Self::SlightlyTrending => Some("medium"),
            Self::NotTrending => Some("low"),
            Self::Off => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Audience parent types
// ---------------------------------------------------------------------------

/// Fixed demographic/lifestyle buckets used to scope audience search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceParentType {
    /// Age and life-stage groups.
    LifeStage,
    /// Professional fields.
    ProfessionalArea,
    /// Lifestyle preferences and beliefs.
    LifestylePreferencesBeliefs,
    /// Hobbies and interests.
    HobbiesAndInterests,
    /// Communities.
    Communities,
    /// Global-issue engagement.
    GlobalIssues,
    /// Investing interests.
    InvestingInterests,
    /// Leisure pursuits.
    Leisure,
    /// Political preferences.
    PoliticalPreferences,
    /// Spending habits.
    SpendingHabits,
}

impl AudienceParentType {
    /// The fully-qualified URN (e.g. `urn:audience:life_stage`).
    pub fn urn(&self) -> &'static str {
        match self {
            Self::LifeStage => "urn:audience:life_stage",
            Self::ProfessionalArea => "urn:audience:professional_area",
            Self::LifestylePreferencesBeliefs => "urn:audience:lifestyle_preferences_beliefs",
            Self::HobbiesAndInterests => "urn:audience:hobbies_and_interests",
            Self::Communities => "urn:audience:communities",
            Self::GlobalIssues => "urn:audience:global_issues",
            Self::InvestingInterests => "urn:audience:investing_interests",
            Self::Leisure => "urn:audience:leisure",
            Self::PoliticalPreferences => "urn:audience:political_preferences",
            Self::SpendingHabits => "urn:audience:spending_habits",
        }
    }

    /// Parse a URN or bare value; unknown buckets fall back to
    /// [`Self::Communities`], the default for untyped audience keywords.
    pub fn parse_lenient(s: &str) -> Self {
        let bare = s.trim().strip_prefix("urn:audience:").unwrap_or(s.trim());
        match bare {
            "life_stage" => Self::LifeStage,
            "professional_area" => Self::ProfessionalArea,
            "lifestyle_preferences_beliefs" => Self::LifestylePreferencesBeliefs,
            "hobbies_and_interests" => Self::HobbiesAndInterests,
            "communities" => Self::Communities,
            "global_issues" => Self::GlobalIssues,
            "investing_interests" => Self::InvestingInterests,
            "leisure" => Self::Leisure,
            "political_preferences" => Self::PoliticalPreferences,
            "spending_habits" => Self::SpendingHabits,
            _ => Self::Communities,
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// An audience keyword with its parent-type bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceKeyword {
    /// Free-text audience term (e.g. "young adults").
    pub keyword: String,
    /// The bucket to scope audience search by.
    pub parent_type: AudienceParentType,
}

/// Optional attribute filters extracted from the inspiration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAttributes {
    /// Release year, if mentioned (raw text; range-validated at mapping time).
    pub year: Option<String>,
    /// Country, if mentioned.
    pub country: Option<String>,
    /// Genre, if mentioned.
    pub genre: Option<String>,
    /// Location attribute, if mentioned (informational; location filtering
    /// goes through the location signal instead).
    pub location: Option<String>,
}

/// Location signal extracted from the inspiration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSignal {
    /// Free-text location query.
    pub query: String,
    /// Radius in meters, raw text; range-validated at mapping time.
    pub radius: Option<String>,
}

/// Structured search intent produced from one inspiration sentence.
///
/// Immutable once produced; merged (not mutated) with resolved identifiers
/// to build the final query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Target entity type.
    pub entity_type: EntityType,
    /// Ordered free-text search terms; the first few are used preferentially.
    pub keywords: Vec<String>,
    /// Free-text category hints (informational downstream).
    pub categories: Vec<String>,
    /// Optional attribute filters.
    pub attributes: QueryAttributes,
    /// Genre/style interest terms.
    pub interest_tags: Vec<String>,
    /// Demographic/lifestyle audience terms. Always empty for
    /// destination/place descriptors.
    pub interest_audiences: Vec<AudienceKeyword>,
    /// Optional location signal.
    pub location_signal: Option<LocationSignal>,
    /// Trend bias.
    pub trend_bias: TrendBias,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from query analysis. All of them are fatal to the pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The model call itself failed.
    #[error("analysis model call failed: {0}")]
    Provider(#[from] ProviderError),
    /// The model output was not the required JSON shape.
    #[error("analysis output was not valid JSON: {detail}")]
    Malformed {
        /// Parse failure detail.
        detail: String,
        /// Raw model output, truncated, kept for diagnosis.
        raw: String,
    },
    /// The model emitted an entity type outside the fixed taxonomy.
    #[error("unrecognized entity type: {0}")]
    UnknownEntityType(String),
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireAnalysis {
    #[serde(rename = "entityType", default)]
    entity_type: String,
    #[serde(default)]
    filters: WireFilters,
    #[serde(default)]
    signals: WireSignals,
}

#[derive(Debug, Default, Deserialize)]
struct WireFilters {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    attributes: WireAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct WireAttributes {
    #[serde(default)]
    year: Value,
    #[serde(default)]
    country: Value,
    #[serde(default)]
    genre: Value,
    #[serde(default)]
    location: Value,
}

#[derive(Debug, Default, Deserialize)]
struct WireSignals {
    #[serde(default)]
    interests: WireInterests,
    #[serde(default)]
    location: WireLocation,
    #[serde(default)]
    trends: Value,
}

#[derive(Debug, Default, Deserialize)]
struct WireInterests {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    audiences: Vec<WireAudience>,
}

/// Audience entries arrive either as a bare keyword or as a tagged object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireAudience {
    Tagged {
        keyword: String,
        #[serde(rename = "parentType", default)]
        parent_type: String,
    },
    Keyword(String),
}

#[derive(Debug, Default, Deserialize)]
struct WireLocation {
    #[serde(default)]
    query: Value,
    #[serde(default)]
    radius: Value,
}

/// Coerce a JSON value to non-empty text (numbers included, nulls dropped).
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Maximum raw-output characters kept in a [`AnalysisError::Malformed`].
const MAX_RAW_SNIPPET_CHARS: usize = 400;

/// Analyze an inspiration sentence into a [`QueryDescriptor`].
///
/// # Errors
///
/// Returns [`AnalysisError`] when the model call fails, the output is not
/// parseable as the required JSON shape, or the entity type is unrecognized.
/// There is no silent defaulting — the caller decides whether to abort or
/// retry.
pub async fn analyze(
    model: &dyn LanguageModel,
    inspiration: &str,
) -> Result<QueryDescriptor, AnalysisError> {
    let prompt = build_analysis_prompt(inspiration);
    let raw = model
        .complete(CompletionRequest::new(prompt, 500, 0.3))
        .await?;

    let descriptor = parse_analysis(&raw)?;
    debug!(
        entity_type = descriptor.entity_type.as_str(),
        keywords = descriptor.keywords.len(),
        tags = descriptor.interest_tags.len(),
        audiences = descriptor.interest_audiences.len(),
        "inspiration analyzed"
    );
    Ok(descriptor)
}

/// Parse and validate a raw model response into a [`QueryDescriptor`].
///
/// Tolerates a Markdown code fence around the JSON but nothing else.
///
/// # Errors
///
/// Returns [`AnalysisError::Malformed`] on parse failure and
/// [`AnalysisError::UnknownEntityType`] for taxonomy violations.
pub fn parse_analysis(raw: &str) -> Result<QueryDescriptor, AnalysisError> {
    let stripped = strip_code_fences(raw);

    let wire: WireAnalysis =
        serde_json::from_str(stripped).map_err(|e| AnalysisError::Malformed {
            detail: e.to_string(),
            raw: raw.chars().take(MAX_RAW_SNIPPET_CHARS).collect(),
        })?;

    let entity_type = EntityType::parse(&wire.entity_type)?;

    let mut interest_audiences: Vec<AudienceKeyword> = wire
        .signals
        .interests
        .audiences
        .into_iter()
        .filter_map(|audience| match audience {
            WireAudience::Tagged {
                keyword,
                parent_type,
            } if !keyword.trim().is_empty() => Some(AudienceKeyword {
                keyword: keyword.trim().to_owned(),
                parent_type: AudienceParentType::parse_lenient(&parent_type),
            }),
            WireAudience::Keyword(keyword) if !keyword.trim().is_empty() => {
                Some(AudienceKeyword {
                    keyword: keyword.trim().to_owned(),
                    parent_type: AudienceParentType::Communities,
                })
            }
            _ => None,
        })
        .collect();

    // Contract, not preference: the recommendation API rejects audience
    // signals for location-like entity types.
    if !entity_type.supports_demographic_signals() {
        interest_audiences.clear();
    }

    let location_signal = value_to_text(&wire.signals.location.query).map(|query| LocationSignal {
        query,
        radius: value_to_text(&wire.signals.location.radius),
    });

    let trend_bias = match value_to_text(&wire.signals.trends) {
        Some(raw_trend) => TrendBias::parse_lenient(&raw_trend),
        None => TrendBias::Off,
    };

    Ok(QueryDescriptor {
        entity_type,
        keywords: wire.filters.keywords,
        categories: wire.filters.categories,
        attributes: QueryAttributes {
            year: value_to_text(&wire.filters.attributes.year),
            country: value_to_text(&wire.filters.attributes.country),
            genre: value_to_text(&wire.filters.attributes.genre),
            location: value_to_text(&wire.filters.attributes.location),
        },
        interest_tags: wire.signals.interests.tags,
        interest_audiences,
        location_signal,
        trend_bias,
    })
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Build the structured-extraction prompt for one inspiration sentence.
pub fn build_analysis_prompt(inspiration: &str) -> String {
    format!(
        r#"Analyze the following user inspiration and extract structured information for a cultural recommendation API:

User Inspiration: "{inspiration}"

Please extract and return a JSON object with the following structure:
{{
  "entityType": "The type of entity (must be one of the exact entity types listed below)",
  "filters": {{
    "keywords": ["list", "of", "relevant", "keywords"],
    "categories": ["list", "of", "categories"],
    "attributes": {{
      "year": "specific year if mentioned",
      "country": "specific country if mentioned",
      "genre": "specific genre if mentioned",
      "location": "specific location if mentioned"
    }}
  }},
  "signals": {{
    "interests": {{
      "tags": ["genre", "style", "or", "category", "keywords", "like", "action", "comedy", "rock", "fantasy"],
      "audiences": [{{"keyword": "young adults", "parentType": "urn:audience:life_stage"}}, {{"keyword": "gamers", "parentType": "urn:audience:hobbies_and_interests"}}]
    }},
    "location": {{
      "query": "location query if mentioned",
      "radius": "radius in meters (number between 0-800000) if mentioned, or 'N/A' if not specified"
    }},
    "trends": "trending level: 'trending', 'very_trending', 'slightly_trending', 'not_trending', or 'off' if not mentioned. Note: destination/place entities do not support trending requests, so use 'off' for these entity types."
  }},
  "output": {{
    "description": "What the user is looking for",
    "intent": "User's intent (discover, explore, find similar, etc.)"
  }}
}}

IMPORTANT: Use ONLY these exact entity types:
- artist
- book
- brand
- destination
- movie
- person
- place
- podcast
- tv_show
- videogame

ENTITY TYPE GUIDANCE:
- Use "destination" for cities, countries, regions, travel destinations (e.g., "Find cities in Europe")
- Use "place" for tourist attractions, landmarks, restaurants, hotels, museums, parks within a city (e.g., "Find restaurants in New York")
- Use "movie" for films, "tv_show" for television series, "videogame" for games
- Use "artist" for musicians, "book" for literature, "brand" for companies and products
- Use "person" for celebrities, "podcast" for audio shows

IMPORTANT AUDIENCE DETECTION RULES:
- Put demographic terms in "audiences" with parent types:
  * Age-related: {{"keyword": "young adults", "parentType": "urn:audience:life_stage"}}
  * Professional: {{"keyword": "tech professionals", "parentType": "urn:audience:professional_area"}}
  * Lifestyle: {{"keyword": "fitness enthusiasts", "parentType": "urn:audience:lifestyle_preferences_beliefs"}}
  * Hobbies: {{"keyword": "gamers", "parentType": "urn:audience:hobbies_and_interests"}}
  * Communities: {{"keyword": "travelers", "parentType": "urn:audience:communities"}}
  * Global Issues: {{"keyword": "environmentalists", "parentType": "urn:audience:global_issues"}}
  * Investing: {{"keyword": "investors", "parentType": "urn:audience:investing_interests"}}
  * Leisure: {{"keyword": "sports fans", "parentType": "urn:audience:leisure"}}
  * Political: {{"keyword": "conservatives", "parentType": "urn:audience:political_preferences"}}
  * Spending: {{"keyword": "luxury shoppers", "parentType": "urn:audience:spending_habits"}}
- Put genre/style terms in "tags": action, comedy, rock, pop, fantasy, etc.
- Note: destination/place entities do not support audience requests, so use an empty array [] for "audiences" when the entity type is destination or place.

Focus on extracting actionable information usable with entity search, tag search, and recommendation APIs. Return only the JSON object."#
    )
}
