//! Scripted fakes for the pipeline's external collaborators.

// Shared by several test harnesses; not every harness uses every fake.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tastemate::analyzer::{AudienceParentType, EntityType};
use tastemate::params::InsightsParams;
use tastemate::providers::{CompletionRequest, LanguageModel, ProviderError};
use tastemate::qloo::{
    CulturalSearch, QlooError, Recommendation, RecommendationSource, SearchHit,
};

/// Language model that replays a fixed response queue and counts calls.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    /// A model that answers with the given responses in order; `Err` entries
    /// simulate provider failures. An exhausted queue also fails.
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many completions were requested.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(detail)) => Err(ProviderError::Parse(detail)),
            None => Err(ProviderError::Empty),
        }
    }
}

/// A model that never answers within any reasonable budget.
pub struct StalledModel;

#[async_trait]
impl LanguageModel for StalledModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
        tokio::time::sleep(std::time::Duration::from_secs(86_400)).await;
        Err(ProviderError::Empty)
    }
}

/// Scripted search service with a per-method call log.
#[derive(Default)]
pub struct FakeSearch {
    /// Entity hits keyed by query keyword.
    pub entities: HashMap<String, Vec<SearchHit>>,
    /// Tag hits keyed by query keyword.
    pub tags: HashMap<String, Vec<SearchHit>>,
    /// Audience hits keyed by parent type.
    pub audiences: HashMap<AudienceParentType, Vec<SearchHit>>,
    /// Hits returned by the unscoped audience listing.
    pub unscoped_audiences: Vec<SearchHit>,
    /// Keywords whose entity search fails.
    pub failing_entity_keywords: Vec<String>,
    /// Call log, as `"method:key"` strings in order.
    pub calls: Mutex<Vec<String>>,
}

impl FakeSearch {
    /// The calls made so far, as `"method:key"` strings in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl CulturalSearch for FakeSearch {
    async fn search_entities(
        &self,
        query: &str,
        _entity_type: EntityType,
        _limit: u32,
    ) -> Result<Vec<SearchHit>, QlooError> {
        self.record(format!("entities:{query}"));
        if self.failing_entity_keywords.iter().any(|k| k == query) {
            return Err(QlooError::Status {
                status: 500,
                message: "scripted failure".to_owned(),
            });
        }
        Ok(self.entities.get(query).cloned().unwrap_or_default())
    }

    async fn search_tags(&self, query: &str, _take: u32) -> Result<Vec<SearchHit>, QlooError> {
        self.record(format!("tags:{query}"));
        Ok(self.tags.get(query).cloned().unwrap_or_default())
    }

    async fn audiences_by_parent(
        &self,
        parent: AudienceParentType,
        _take: u32,
    ) -> Result<Vec<SearchHit>, QlooError> {
        self.record(format!("audiences:{}", parent.urn()));
        Ok(self.audiences.get(&parent).cloned().unwrap_or_default())
    }

    async fn audiences_unscoped(&self, _take: u32) -> Result<Vec<SearchHit>, QlooError> {
        self.record("audiences:unscoped".to_owned());
        Ok(self.unscoped_audiences.clone())
    }
}

/// Scripted recommendation source capturing the params it was called with.
#[derive(Default)]
pub struct FakeRecommender {
    responses: Mutex<VecDeque<Result<Vec<Recommendation>, QlooError>>>,
    captured: Mutex<Vec<InsightsParams>>,
}

impl FakeRecommender {
    /// A recommender that replays the given responses in order.
    pub fn new(responses: Vec<Result<Vec<Recommendation>, QlooError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            captured: Mutex::new(Vec::new()),
        }
    }

    /// The parameter sets of every fetch made so far.
    pub fn captured(&self) -> Vec<InsightsParams> {
        self.captured.lock().expect("captured lock").clone()
    }
}

#[async_trait]
impl RecommendationSource for FakeRecommender {
    async fn fetch_insights(
        &self,
        params: &InsightsParams,
    ) -> Result<Vec<Recommendation>, QlooError> {
        self.captured
            .lock()
            .expect("captured lock")
            .push(params.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Shorthand for a search hit.
pub fn hit(id: &str, name: &str) -> SearchHit {
    SearchHit {
        id: id.to_owned(),
        name: name.to_owned(),
    }
}

/// Shorthand for a recommendation entity.
pub fn rec(name: &str, description: &str) -> Recommendation {
    Recommendation {
        name: name.to_owned(),
        description: description.to_owned(),
        address: None,
    }
}

/// A complete, valid analysis response for a movie query.
pub fn movie_analysis_json() -> String {
    r#"{
        "entityType": "movie",
        "filters": {
            "keywords": ["inception", "thriller"],
            "categories": ["entertainment"],
            "attributes": {"year": "N/A", "country": "N/A", "genre": "thriller", "location": "N/A"}
        },
        "signals": {
            "interests": {
                "tags": ["thriller", "sci-fi"],
                "audiences": [{"keyword": "young adults", "parentType": "urn:audience:life_stage"}]
            },
            "location": {"query": "N/A", "radius": "N/A"},
            "trends": "trending"
        },
        "output": {"description": "movies like Inception", "intent": "find similar"}
    }"#
    .to_owned()
}
