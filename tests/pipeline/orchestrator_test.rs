//! End-to-end pipeline orchestration tests against scripted collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tastemate::composer::NO_RESULTS_MESSAGE;
use tastemate::analyzer::EntityType;
use tastemate::pipeline::{Pipeline, PipelineError, Stage};
use tastemate::qloo::QlooError;

use crate::support::{
    hit, movie_analysis_json, rec, FakeRecommender, FakeSearch, ScriptedModel, StalledModel,
};

const BUDGET: Duration = Duration::from_secs(25);

fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

fn movie_search() -> FakeSearch {
    let mut entities = HashMap::new();
    entities.insert("inception".to_owned(), vec![hit("E1", "Inception")]);
    let mut tags = HashMap::new();
    tags.insert("thriller".to_owned(), vec![hit("T1", "Thriller")]);
    FakeSearch {
        entities,
        tags,
        ..FakeSearch::default()
    }
}

#[tokio::test]
async fn full_run_produces_message_and_stage_traces() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(movie_analysis_json()),
        Ok("Ooh, you'll love these! 🎬".to_owned()),
    ]));
    let recommender = Arc::new(FakeRecommender::new(vec![Ok(vec![
        rec("Tenet", "Time games"),
        rec("Memento", "Backwards"),
        rec("Shutter Island", "Twisty"),
    ])]));
    let pipeline = Pipeline::new(
        model.clone(),
        Arc::new(movie_search()),
        recommender.clone(),
        BUDGET,
    );

    let run = pipeline
        .run("Find movies similar to \"Inception\"", &mut seeded_rng())
        .await
        .expect("run should succeed");

    assert_eq!(run.message, "Ooh, you'll love these! 🎬");
    assert_eq!(run.entity_type, EntityType::Movie);
    assert_eq!(run.recommendations.len(), 3);
    let stages: Vec<Stage> = run.stages.iter().map(|t| t.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Analyze,
            Stage::Resolve,
            Stage::MapParams,
            Stage::Fetch,
            Stage::Compose
        ]
    );
    // Two model calls: one analysis, one composition.
    assert_eq!(model.call_count(), 2);

    // The fetch received the mapped signals from the resolved candidates.
    let captured = recommender.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].get("filter.type"), Some("urn:entity:movie"));
    assert_eq!(captured[0].get("signal.interests.entities"), Some("E1"));
    assert_eq!(captured[0].get("bias.trends"), Some("high"));
}

#[tokio::test]
async fn unparseable_analysis_aborts_before_any_search() {
    let model = Arc::new(ScriptedModel::new(vec![Ok(
        "Sure! Here are some ideas...".to_owned()
    )]));
    let search = Arc::new(FakeSearch::default());
    let recommender = Arc::new(FakeRecommender::default());
    let pipeline = Pipeline::new(
        model,
        search.clone(),
        recommender.clone(),
        BUDGET,
    );

    let result = pipeline.run("anything", &mut seeded_rng()).await;
    assert!(matches!(result, Err(PipelineError::Analysis(_))));
    assert!(search.calls().is_empty(), "no search after failed analysis");
    assert!(recommender.captured().is_empty(), "no fetch after failed analysis");
}

#[tokio::test]
async fn rate_limit_exhaustion_is_a_distinct_error() {
    let model = Arc::new(ScriptedModel::new(vec![Ok(movie_analysis_json())]));
    let recommender = Arc::new(FakeRecommender::new(vec![Err(QlooError::RateLimited {
        attempts: 3,
    })]));
    let pipeline = Pipeline::new(model, Arc::new(movie_search()), recommender, BUDGET);

    let result = pipeline.run("movies", &mut seeded_rng()).await;
    match result {
        Err(PipelineError::RateLimited { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected rate-limited error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_rate_limit_fetch_failure_maps_to_fetch_error() {
    let model = Arc::new(ScriptedModel::new(vec![Ok(movie_analysis_json())]));
    let recommender = Arc::new(FakeRecommender::new(vec![Err(QlooError::Status {
        status: 400,
        message: "invalid signal".to_owned(),
    })]));
    let pipeline = Pipeline::new(model, Arc::new(movie_search()), recommender, BUDGET);

    let result = pipeline.run("movies", &mut seeded_rng()).await;
    assert!(matches!(result, Err(PipelineError::Fetch(_))));
}

#[tokio::test]
async fn empty_fetch_results_compose_without_a_second_model_call() {
    let model = Arc::new(ScriptedModel::new(vec![Ok(movie_analysis_json())]));
    let recommender = Arc::new(FakeRecommender::new(vec![Ok(Vec::new())]));
    let pipeline = Pipeline::new(
        model.clone(),
        Arc::new(movie_search()),
        recommender,
        BUDGET,
    );

    let run = pipeline
        .run("movies", &mut seeded_rng())
        .await
        .expect("empty results are a valid outcome");
    assert_eq!(run.message, NO_RESULTS_MESSAGE);
    assert!(run.recommendations.is_empty());
    // Analysis only — composition must not touch the model for zero results.
    assert_eq!(model.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_model_hits_the_wall_clock_budget() {
    let pipeline = Pipeline::new(
        Arc::new(StalledModel),
        Arc::new(FakeSearch::default()),
        Arc::new(FakeRecommender::default()),
        Duration::from_secs(25),
    );

    let result = pipeline.run("movies", &mut seeded_rng()).await;
    match result {
        Err(PipelineError::Timeout { budget_secs }) => assert_eq!(budget_secs, 25),
        other => panic!("expected timeout, got {other:?}"),
    }
}
