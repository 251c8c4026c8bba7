//! Response composer tests: canned paths, fallback, and subset bounds.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tastemate::composer::{
    compose, NO_RESULTS_MESSAGE, NO_VALID_RESULTS_MESSAGE, COMPOSE_FALLBACK_MESSAGE,
};
use tastemate::qloo::Recommendation;

use crate::support::{rec, ScriptedModel};

fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(9)
}

#[tokio::test]
async fn empty_results_use_canned_message_without_model_call() {
    let model = ScriptedModel::new(vec![Ok("should never be used".to_owned())]);
    let message = compose(&model, "find coffee", &[], &mut seeded_rng()).await;
    assert_eq!(message, NO_RESULTS_MESSAGE);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn all_malformed_results_use_canned_message_without_model_call() {
    let model = ScriptedModel::new(vec![Ok("should never be used".to_owned())]);
    let malformed = vec![
        Recommendation {
            name: "".to_owned(),
            description: "orphan description".to_owned(),
            address: None,
        },
        Recommendation {
            name: "Orphan Name".to_owned(),
            description: " ".to_owned(),
            address: None,
        },
    ];
    let message = compose(&model, "find coffee", &malformed, &mut seeded_rng()).await;
    assert_eq!(message, NO_VALID_RESULTS_MESSAGE);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn model_output_is_returned_verbatim() {
    let model = ScriptedModel::new(vec![Ok("Hey! Try these spots ☕".to_owned())]);
    let results = vec![rec("Blue Bottle", "Coffee"), rec("Ritual", "More coffee")];
    let message = compose(&model, "find coffee", &results, &mut seeded_rng()).await;
    assert_eq!(message, "Hey! Try these spots ☕");
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn model_failure_falls_back_deterministically() {
    let model = ScriptedModel::new(vec![Err("scripted outage".to_owned())]);
    let results = vec![rec("Blue Bottle", "Coffee")];
    let message = compose(&model, "find coffee", &results, &mut seeded_rng()).await;
    assert_eq!(message, COMPOSE_FALLBACK_MESSAGE);
}

#[tokio::test]
async fn blank_model_output_falls_back_deterministically() {
    let model = ScriptedModel::new(vec![Ok("   ".to_owned())]);
    let results = vec![rec("Blue Bottle", "Coffee")];
    let message = compose(&model, "find coffee", &results, &mut seeded_rng()).await;
    assert_eq!(message, COMPOSE_FALLBACK_MESSAGE);
}
