//! End-to-end pipeline orchestration.
//!
//! Sequences analyze → resolve → merge → map → fetch → compose for one
//! inspiration sentence, recording a structured trace per stage, under a
//! hard wall-clock budget. Each run owns its descriptor and parameter
//! objects; there is no shared mutable state between concurrent runs.
//!
//! Failure policy: analysis failures, rate-limit exhaustion, fetch failures,
//! and timeouts abort the run. Partial identifier resolution and composition
//! failures are absorbed inside their stages and the run continues.

pub mod batch;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analyzer::{self, AnalysisError, EntityType};
use crate::composer;
use crate::params::{map_insights_params, ResolvedQuery};
use crate::providers::LanguageModel;
use crate::qloo::{CulturalSearch, QlooError, Recommendation, RecommendationSource};
use crate::resolver;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Language-model query analysis.
    Analyze,
    /// Identifier resolution.
    Resolve,
    /// Parameter mapping.
    MapParams,
    /// Recommendation fetch.
    Fetch,
    /// Message composition.
    Compose,
}

impl Stage {
    /// Stage name used in traces and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Resolve => "resolve",
            Self::MapParams => "map_params",
            Self::Fetch => "fetch",
            Self::Compose => "compose",
        }
    }
}

/// One completed stage with a short human-readable summary.
#[derive(Debug, Clone)]
pub struct StageTrace {
    /// Which stage ran.
    pub stage: Stage,
    /// What it produced (counts, key decisions).
    pub detail: String,
    /// Wall-clock duration of the stage.
    pub elapsed: Duration,
}

/// The result of one successful pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Unique run identifier, for log correlation.
    pub run_id: Uuid,
    /// The inspiration sentence that drove the run.
    pub inspiration: String,
    /// The entity type the query resolved to.
    pub entity_type: EntityType,
    /// Recommendations returned by the fetch stage (may be empty).
    pub recommendations: Vec<Recommendation>,
    /// The composed user-facing message.
    pub message: String,
    /// Per-stage traces, in execution order.
    pub stages: Vec<StageTrace>,
}

/// Stage-fatal pipeline errors. Each aborts only the current run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The query analyzer could not produce a valid descriptor.
    #[error("query analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    /// The recommendation fetch was rate limited past its retry budget.
    #[error("recommendation fetch rate limited after {attempts} attempts")]
    RateLimited {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The recommendation fetch failed for a non-rate-limit reason.
    #[error("recommendation fetch failed: {0}")]
    Fetch(QlooError),
    /// The run exceeded its wall-clock budget.
    #[error("pipeline timed out after {budget_secs}s")]
    Timeout {
        /// The configured budget in seconds.
        budget_secs: u64,
    },
}

/// The recommendation pipeline, wired to its external collaborators.
///
/// Clients are passed in explicitly — no module-level globals — so
/// concurrent per-user runs share nothing mutable.
#[derive(Clone)]
pub struct Pipeline {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn CulturalSearch>,
    recommender: Arc<dyn RecommendationSource>,
    budget: Duration,
}

impl Pipeline {
    /// Wire a pipeline to its collaborators with the given run budget.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn CulturalSearch>,
        recommender: Arc<dyn RecommendationSource>,
        budget: Duration,
    ) -> Self {
        Self {
            model,
            search,
            recommender,
            budget,
        }
    }

    /// The language model this pipeline composes and analyzes with.
    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Run the pipeline end to end for one inspiration sentence.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for stage-fatal failures; see the module
    /// docs for which stages absorb their own errors instead.
    pub async fn run<R: Rng + Send>(
        &self,
        inspiration: &str,
        rng: &mut R,
    ) -> Result<PipelineRun, PipelineError> {
        let budget_secs = self.budget.as_secs();
        match tokio::time::timeout(self.budget, self.run_inner(inspiration, rng)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout { budget_secs }),
        }
    }

    async fn run_inner<R: Rng + Send>(
        &self,
        inspiration: &str,
        rng: &mut R,
    ) -> Result<PipelineRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let mut stages = Vec::new();
        info!(%run_id, inspiration, "pipeline run started");

        // Stage 1: analysis. Fatal on unparseable model output.
        let started = Instant::now();
        let descriptor = analyzer::analyze(self.model.as_ref(), inspiration).await?;
        stages.push(StageTrace {
            stage: Stage::Analyze,
            detail: format!(
                "entity_type={} keywords={} tags={} audiences={}",
                descriptor.entity_type.as_str(),
                descriptor.keywords.len(),
                descriptor.interest_tags.len(),
                descriptor.interest_audiences.len()
            ),
            elapsed: started.elapsed(),
        });

        // Stage 2: identifier resolution. Absorbs its own failures.
        let started = Instant::now();
        let candidates = resolver::resolve(self.search.as_ref(), &descriptor).await;
        stages.push(StageTrace {
            stage: Stage::Resolve,
            detail: format!(
                "entities={} tags={} audiences={}",
                candidates.entities.len(),
                candidates.tags.len(),
                candidates.audiences.len()
            ),
            elapsed: started.elapsed(),
        });

        // Stage 3: merge + map. Pure; validation drops are silent.
        let started = Instant::now();
        let entity_type = descriptor.entity_type;
        let resolved = ResolvedQuery::new(descriptor, &candidates);
        let params = map_insights_params(&resolved);
        stages.push(StageTrace {
            stage: Stage::MapParams,
            detail: format!("params={}", params.len()),
            elapsed: started.elapsed(),
        });
        debug!(%run_id, params = ?params.to_query_pairs(), "mapped insights params");

        // Stage 4: fetch. Fatal; rate-limit exhaustion is distinct.
        let started = Instant::now();
        let recommendations =
            self.recommender
                .fetch_insights(&params)
                .await
                .map_err(|e| match e {
                    QlooError::RateLimited { attempts } => PipelineError::RateLimited { attempts },
                    other => PipelineError::Fetch(other),
                })?;
        stages.push(StageTrace {
            stage: Stage::Fetch,
            detail: format!("results={}", recommendations.len()),
            elapsed: started.elapsed(),
        });

        // Stage 5: composition. Absorbs its own failures.
        let started = Instant::now();
        let message =
            composer::compose(self.model.as_ref(), inspiration, &recommendations, rng).await;
        stages.push(StageTrace {
            stage: Stage::Compose,
            detail: format!("message_chars={}", message.chars().count()),
            elapsed: started.elapsed(),
        });

        info!(
            %run_id,
            results = recommendations.len(),
            "pipeline run completed"
        );
        Ok(PipelineRun {
            run_id,
            inspiration: inspiration.to_owned(),
            entity_type,
            recommendations,
            message,
            stages,
        })
    }
}
