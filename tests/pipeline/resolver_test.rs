//! Identifier resolver tests: limits, ordering, fallback broadening, and
//! failure absorption.

use std::collections::HashMap;

use tastemate::analyzer::{
    AudienceKeyword, AudienceParentType, EntityType, QueryAttributes, QueryDescriptor, TrendBias,
};
use tastemate::resolver::{self, AUDIENCE_KEYWORD_LIMIT, HITS_PER_KEYWORD, KEYWORD_LIMIT};

use crate::support::{hit, FakeSearch};

fn descriptor(keywords: &[&str], audiences: Vec<AudienceKeyword>) -> QueryDescriptor {
    QueryDescriptor {
        entity_type: EntityType::Movie,
        keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
        categories: vec![],
        attributes: QueryAttributes::default(),
        interest_tags: vec![],
        interest_audiences: audiences,
        location_signal: None,
        trend_bias: TrendBias::Off,
    }
}

fn audience(keyword: &str, parent_type: AudienceParentType) -> AudienceKeyword {
    AudienceKeyword {
        keyword: keyword.to_owned(),
        parent_type,
    }
}

#[tokio::test]
async fn only_the_leading_keywords_are_searched() {
    let search = FakeSearch::default();
    let d = descriptor(&["k1", "k2", "k3", "k4", "k5"], vec![]);
    resolver::resolve(&search, &d).await;

    let calls = search.calls();
    let entity_calls: Vec<&String> = calls.iter().filter(|c| c.starts_with("entities:")).collect();
    assert_eq!(entity_calls.len(), KEYWORD_LIMIT);
    assert!(!calls.contains(&"entities:k4".to_owned()));
}

#[tokio::test]
async fn hits_are_capped_per_keyword_and_merged_in_keyword_order() {
    let mut entities = HashMap::new();
    entities.insert(
        "k1".to_owned(),
        vec![hit("A", "a"), hit("B", "b"), hit("C", "c")],
    );
    entities.insert("k2".to_owned(), vec![hit("D", "d")]);
    let search = FakeSearch {
        entities,
        ..FakeSearch::default()
    };

    let candidates = resolver::resolve(&search, &descriptor(&["k1", "k2"], vec![])).await;
    let ids: Vec<&str> = candidates.entities.iter().map(|h| h.id.as_str()).collect();
    // Two per keyword, first keyword's hits first.
    assert_eq!(ids, vec!["A", "B", "D"]);
    assert!(candidates.entities.len() <= 2 * HITS_PER_KEYWORD);
}

#[tokio::test]
async fn one_failing_keyword_does_not_stop_the_others() {
    let mut entities = HashMap::new();
    entities.insert("good".to_owned(), vec![hit("G", "good hit")]);
    let search = FakeSearch {
        entities,
        failing_entity_keywords: vec!["bad".to_owned()],
        ..FakeSearch::default()
    };

    let candidates = resolver::resolve(&search, &descriptor(&["bad", "good"], vec![])).await;
    assert_eq!(candidates.entities.len(), 1);
    assert_eq!(candidates.entities[0].id, "G");
}

#[tokio::test]
async fn audience_names_are_filtered_by_keyword_substring() {
    let mut audiences = HashMap::new();
    audiences.insert(
        AudienceParentType::LifeStage,
        vec![
            hit("A1", "Young Adults 18-25"),
            hit("A2", "Seniors"),
            hit("A3", "Young Professionals"),
            hit("A4", "Young Parents"),
        ],
    );
    let search = FakeSearch {
        audiences,
        ..FakeSearch::default()
    };

    let d = descriptor(&[], vec![audience("young", AudienceParentType::LifeStage)]);
    let candidates = resolver::resolve(&search, &d).await;
    let ids: Vec<&str> = candidates.audiences.iter().map(|h| h.id.as_str()).collect();
    // Matching names only, capped at two.
    assert_eq!(ids, vec!["A1", "A3"]);
}

#[tokio::test]
async fn no_substring_match_takes_top_entries_from_the_bucket() {
    let mut audiences = HashMap::new();
    audiences.insert(
        AudienceParentType::Leisure,
        vec![hit("L1", "Hikers"), hit("L2", "Golfers"), hit("L3", "Anglers")],
    );
    let search = FakeSearch {
        audiences,
        ..FakeSearch::default()
    };

    let d = descriptor(&[], vec![audience("cyclists", AudienceParentType::Leisure)]);
    let candidates = resolver::resolve(&search, &d).await;
    let ids: Vec<&str> = candidates.audiences.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["L1", "L2"]);
}

#[tokio::test]
async fn only_the_leading_audience_keywords_are_resolved() {
    let mut audiences = HashMap::new();
    audiences.insert(AudienceParentType::LifeStage, vec![hit("A1", "Young Adults")]);
    audiences.insert(AudienceParentType::Leisure, vec![hit("L1", "Hikers")]);
    audiences.insert(AudienceParentType::Communities, vec![hit("C1", "Travelers")]);
    let search = FakeSearch {
        audiences,
        ..FakeSearch::default()
    };

    let d = descriptor(
        &[],
        vec![
            audience("young adults", AudienceParentType::LifeStage),
            audience("hikers", AudienceParentType::Leisure),
            audience("travelers", AudienceParentType::Communities),
        ],
    );
    resolver::resolve(&search, &d).await;

    let audience_calls: Vec<String> = search
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("audiences:"))
        .collect();
    assert_eq!(audience_calls.len(), AUDIENCE_KEYWORD_LIMIT);
    assert!(!audience_calls.contains(&"audiences:urn:audience:communities".to_owned()));
}

#[tokio::test]
async fn broadening_ladder_stops_at_the_first_non_empty_rung() {
    // Declared bucket is empty; the ladder's second rung has entries.
    let mut audiences = HashMap::new();
    audiences.insert(
        AudienceParentType::ProfessionalArea,
        vec![hit("P1", "Engineers"), hit("P2", "Designers"), hit("P3", "Medics")],
    );
    let search = FakeSearch {
        audiences,
        ..FakeSearch::default()
    };

    let d = descriptor(
        &[],
        vec![audience("quilters", AudienceParentType::SpendingHabits)],
    );
    let candidates = resolver::resolve(&search, &d).await;
    let ids: Vec<&str> = candidates.audiences.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P2"]);

    let calls = search.calls();
    // Ladder stopped before the remaining rungs and never went unscoped.
    assert!(!calls.contains(&"audiences:urn:audience:hobbies_and_interests".to_owned()));
    assert!(!calls.contains(&"audiences:unscoped".to_owned()));
}

#[tokio::test]
async fn unscoped_listing_is_the_last_resort() {
    let search = FakeSearch {
        unscoped_audiences: vec![
            hit("U1", "General One"),
            hit("U2", "General Two"),
            hit("U3", "General Three"),
            hit("U4", "General Four"),
        ],
        ..FakeSearch::default()
    };

    let d = descriptor(
        &[],
        vec![audience("quilters", AudienceParentType::SpendingHabits)],
    );
    let candidates = resolver::resolve(&search, &d).await;
    // First three of the unscoped listing.
    assert_eq!(candidates.audiences.len(), 3);
    assert!(search.calls().contains(&"audiences:unscoped".to_owned()));
}

#[tokio::test]
async fn empty_audience_list_skips_audience_resolution_entirely() {
    // Even a search service full of audiences must not leak any into a
    // descriptor that carries no audience keywords (the destination/place
    // analyzer contract).
    let mut audiences = HashMap::new();
    audiences.insert(AudienceParentType::LifeStage, vec![hit("A1", "Young Adults")]);
    let search = FakeSearch {
        audiences,
        unscoped_audiences: vec![hit("U1", "General")],
        ..FakeSearch::default()
    };

    let mut d = descriptor(&["cities"], vec![]);
    d.entity_type = EntityType::Destination;
    let candidates = resolver::resolve(&search, &d).await;

    assert!(candidates.audiences.is_empty());
    assert!(
        !search.calls().iter().any(|c| c.starts_with("audiences:")),
        "no audience endpoint should be touched"
    );
}
