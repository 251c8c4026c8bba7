//! Parameter mapping: descriptor + resolved identifiers → validated
//! recommendation-endpoint parameters.
//!
//! Pure, no I/O, and deterministic: the parameter set is backed by a
//! `BTreeMap`, so the same input always serializes byte-identically.
//!
//! Validation drops individual fields silently (bad year, bad radius, empty
//! or sentinel strings) rather than failing the pipeline. Two rules are API
//! capability constraints, not data-quality choices: location-like entity
//! types never receive a trend bias or a demographic audience signal.

use std::collections::{BTreeMap, HashSet};

use crate::analyzer::QueryDescriptor;
use crate::qloo::SearchHit;
use crate::resolver::ResolvedCandidates;

/// Result page size requested from the recommendation endpoint.
pub const TAKE: u32 = 20;

/// Maximum tag identifiers sent per request.
pub const TAG_ID_CAP: usize = 5;

/// Maximum entity identifiers sent per request.
pub const ENTITY_ID_CAP: usize = 3;

/// Maximum audience identifiers sent per request.
pub const AUDIENCE_ID_CAP: usize = 3;

/// Accepted release-year range.
pub const YEAR_RANGE: std::ops::RangeInclusive<i64> = 1900..=2030;

/// Maximum accepted location radius in meters.
pub const RADIUS_MAX_METERS: f64 = 800_000.0;

/// Radius used when a location query has no valid radius.
pub const DEFAULT_RADIUS_METERS: u32 = 50_000;

/// Sentinel the analyzer emits for absent attribute values.
const NOT_AVAILABLE: &str = "N/A";

// ---------------------------------------------------------------------------
// Resolved query
// ---------------------------------------------------------------------------

/// A descriptor merged with its resolved identifier sets.
///
/// Identifier lists are deduplicated preserving first-seen order; caps are
/// applied later, at mapping time.
#[derive(Debug, Clone)]
pub struct ResolvedQuery {
    /// The original immutable descriptor.
    pub descriptor: QueryDescriptor,
    /// Deduplicated entity identifiers.
    pub entity_ids: Vec<String>,
    /// Deduplicated tag identifiers.
    pub tag_ids: Vec<String>,
    /// Deduplicated audience identifiers.
    pub audience_ids: Vec<String>,
}

impl ResolvedQuery {
    /// Merge a descriptor with resolved candidates.
    pub fn new(descriptor: QueryDescriptor, candidates: &ResolvedCandidates) -> Self {
        Self {
            entity_ids: dedup_ids(&candidates.entities),
            tag_ids: dedup_ids(&candidates.tags),
            audience_ids: dedup_ids(&candidates.audiences),
            descriptor,
        }
    }
}

fn dedup_ids(hits: &[SearchHit]) -> Vec<String> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert(hit.id.clone()))
        .map(|hit| hit.id.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Insights params
// ---------------------------------------------------------------------------

/// Flat key-value parameter set for the recommendation endpoint.
///
/// Always contains `filter.type` and `take`, plus at least one further
/// signal or filter (a default is injected when nothing resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightsParams(BTreeMap<String, String>);

impl InsightsParams {
    /// Look up a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether a parameter is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty (never true for mapped output).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate parameters in stable key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Materialize query pairs for an HTTP request, in stable key order.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Map a resolved query onto validated recommendation parameters.
pub fn map_insights_params(query: &ResolvedQuery) -> InsightsParams {
    let descriptor = &query.descriptor;
    let mut params: BTreeMap<String, String> = BTreeMap::new();

    params.insert("filter.type".to_owned(), descriptor.entity_type.urn());
    params.insert("take".to_owned(), TAKE.to_string());

    // Attribute filters: year must parse and fall in range, text attributes
    // must be non-empty and not the absent-value sentinel.
    if let Some(year) = descriptor
        .attributes
        .year
        .as_deref()
        .and_then(|y| y.trim().parse::<i64>().ok())
        .filter(|y| YEAR_RANGE.contains(y))
    {
        params.insert("filter.release_year.min".to_owned(), year.to_string());
        params.insert("filter.release_year.max".to_owned(), year.to_string());
    }
    if let Some(country) = present(descriptor.attributes.country.as_deref()) {
        params.insert("filter.release_country".to_owned(), country.to_owned());
    }
    if let Some(genre) = present(descriptor.attributes.genre.as_deref()) {
        params.insert("filter.tags".to_owned(), genre.to_owned());
    }

    // Identifier signals, capped and comma-joined; empty lists are omitted
    // entirely rather than sent as empty strings.
    if let Some(joined) = join_ids(&query.tag_ids, TAG_ID_CAP) {
        params.insert("signal.interests.tags".to_owned(), joined);
    }
    if descriptor.entity_type.supports_demographic_signals() {
        if let Some(joined) = join_ids(&query.audience_ids, AUDIENCE_ID_CAP) {
            params.insert("signal.demographics.audiences".to_owned(), joined);
        }
    }
    if let Some(joined) = join_ids(&query.entity_ids, ENTITY_ID_CAP) {
        params.insert("signal.interests.entities".to_owned(), joined);
    }

    // Location signal: query text plus a range-checked radius with a default.
    if let Some(signal) = &descriptor.location_signal {
        if let Some(location_query) = present(Some(signal.query.as_str())) {
            params.insert("signal.location.query".to_owned(), location_query.to_owned());
            let radius = signal
                .radius
                .as_deref()
                .filter(|r| *r != NOT_AVAILABLE)
                .and_then(|r| r.trim().parse::<f64>().ok())
                .filter(|r| (0.0..=RADIUS_MAX_METERS).contains(r))
                .map(format_radius)
                .unwrap_or_else(|| DEFAULT_RADIUS_METERS.to_string());
            params.insert("signal.location.radius".to_owned(), radius);
        }
    }

    // Trend bias, collapsed to the three accepted levels; omitted when off
    // or unsupported for the entity type.
    if descriptor.entity_type.supports_trend_bias() {
        if let Some(level) = descriptor.trend_bias.insights_level() {
            params.insert("bias.trends".to_owned(), level.to_owned());
        }
    }

    // The endpoint rejects queries with no signal beyond type and page size;
    // inject a default so it never sees an under-specified query.
    if params.len() <= 2 {
        if descriptor.entity_type.supports_trend_bias() {
            params.insert("bias.trends".to_owned(), "medium".to_owned());
        } else {
            params.insert("signal.location.query".to_owned(), "global".to_owned());
            params.insert(
                "signal.location.radius".to_owned(),
                DEFAULT_RADIUS_METERS.to_string(),
            );
        }
    }

    InsightsParams(params)
}

fn present(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != NOT_AVAILABLE)
}

fn join_ids(ids: &[String], cap: usize) -> Option<String> {
    let valid: Vec<&str> = ids
        .iter()
        .map(String::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty() && *id != NOT_AVAILABLE)
        .take(cap)
        .collect();
    if valid.is_empty() {
        None
    } else {
        Some(valid.join(","))
    }
}

/// Render a validated radius; whole meters print without a fraction.
fn format_radius(radius: f64) -> String {
    if radius.fract() == 0.0 {
        format!("{radius:.0}")
    } else {
        radius.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{
        AudienceKeyword, AudienceParentType, EntityType, LocationSignal, QueryAttributes,
        QueryDescriptor, TrendBias,
    };

    fn hit(id: &str) -> SearchHit {
        SearchHit {
            id: id.to_owned(),
            name: id.to_owned(),
        }
    }

    fn descriptor(entity_type: EntityType) -> QueryDescriptor {
        QueryDescriptor {
            entity_type,
            keywords: vec![],
            categories: vec![],
            attributes: QueryAttributes::default(),
            interest_tags: vec![],
            interest_audiences: vec![],
            location_signal: None,
            trend_bias: TrendBias::Off,
        }
    }

    fn resolved(descriptor: QueryDescriptor) -> ResolvedQuery {
        ResolvedQuery::new(descriptor, &ResolvedCandidates::default())
    }

    #[test]
    fn always_carries_type_take_and_one_signal() {
        let params = map_insights_params(&resolved(descriptor(EntityType::Movie)));
        assert_eq!(params.get("filter.type"), Some("urn:entity:movie"));
        assert_eq!(params.get("take"), Some("20"));
        assert!(params.len() >= 3, "needs at least one signal beyond type/take");
    }

    #[test]
    fn signal_free_movie_descriptor_gets_medium_trend_default() {
        let params = map_insights_params(&resolved(descriptor(EntityType::Movie)));
        assert_eq!(params.get("bias.trends"), Some("medium"));
    }

    #[test]
    fn signal_free_destination_gets_global_location_default() {
        let params = map_insights_params(&resolved(descriptor(EntityType::Destination)));
        assert_eq!(params.get("signal.location.query"), Some("global"));
        assert_eq!(params.get("signal.location.radius"), Some("50000"));
        assert!(!params.contains_key("bias.trends"));
    }

    #[test]
    fn destination_and_place_never_get_trends_or_audiences() {
        for entity_type in [EntityType::Destination, EntityType::Place] {
            let mut d = descriptor(entity_type);
            d.trend_bias = TrendBias::Trending;
            d.interest_audiences = vec![AudienceKeyword {
                keyword: "travelers".to_owned(),
                parent_type: AudienceParentType::Communities,
            }];
            let candidates = ResolvedCandidates {
                audiences: vec![hit("A1"), hit("A2")],
                ..Default::default()
            };
            let params = map_insights_params(&ResolvedQuery::new(d, &candidates));
            assert!(!params.contains_key("bias.trends"));
            assert!(!params.contains_key("signal.demographics.audiences"));
        }
    }

    #[test]
    fn identifier_lists_are_deduped_capped_and_joined() {
        let mut d = descriptor(EntityType::Movie);
        d.trend_bias = TrendBias::Trending;
        let candidates = ResolvedCandidates {
            entities: vec![hit("E1"), hit("E1"), hit("E2"), hit("E3"), hit("E4")],
            tags: vec![
                hit("T1"),
                hit("T2"),
                hit("T3"),
                hit("T4"),
                hit("T5"),
                hit("T6"),
            ],
            audiences: vec![hit("A1"), hit("A2"), hit("A3"), hit("A4")],
        };
        let params = map_insights_params(&ResolvedQuery::new(d, &candidates));
        assert_eq!(params.get("signal.interests.entities"), Some("E1,E2,E3"));
        assert_eq!(
            params.get("signal.interests.tags"),
            Some("T1,T2,T3,T4,T5")
        );
        assert_eq!(params.get("signal.demographics.audiences"), Some("A1,A2,A3"));
    }

    #[test]
    fn empty_id_lists_are_omitted_not_empty_strings() {
        let mut d = descriptor(EntityType::Movie);
        d.trend_bias = TrendBias::Trending;
        let params = map_insights_params(&resolved(d));
        assert!(!params.contains_key("signal.interests.tags"));
        assert!(!params.contains_key("signal.interests.entities"));
        assert!(!params.contains_key("signal.demographics.audiences"));
    }

    #[test]
    fn year_in_range_sets_min_and_max() {
        let mut d = descriptor(EntityType::Movie);
        d.attributes.year = Some("2015".to_owned());
        let params = map_insights_params(&resolved(d));
        assert_eq!(params.get("filter.release_year.min"), Some("2015"));
        assert_eq!(params.get("filter.release_year.max"), Some("2015"));
    }

    #[test]
    fn out_of_range_or_unparseable_year_is_dropped() {
        for year in ["1850", "2080", "next year"] {
            let mut d = descriptor(EntityType::Movie);
            d.attributes.year = Some(year.to_owned());
            let params = map_insights_params(&resolved(d));
            assert!(
                !params.contains_key("filter.release_year.min"),
                "year {year} should be dropped"
            );
        }
    }

    #[test]
    fn sentinel_attributes_are_dropped() {
        let mut d = descriptor(EntityType::Movie);
        d.attributes.country = Some("N/A".to_owned());
        d.attributes.genre = Some("  ".to_owned());
        let params = map_insights_params(&resolved(d));
        assert!(!params.contains_key("filter.release_country"));
        assert!(!params.contains_key("filter.tags"));
    }

    #[test]
    fn location_radius_defaults_when_missing_or_invalid() {
        for radius in [None, Some("N/A".to_owned()), Some("900000".to_owned())] {
            let mut d = descriptor(EntityType::Place);
            d.location_signal = Some(LocationSignal {
                query: "Paris".to_owned(),
                radius,
            });
            let params = map_insights_params(&resolved(d));
            assert_eq!(params.get("signal.location.query"), Some("Paris"));
            assert_eq!(params.get("signal.location.radius"), Some("50000"));
        }
    }

    #[test]
    fn valid_radius_is_kept() {
        let mut d = descriptor(EntityType::Place);
        d.location_signal = Some(LocationSignal {
            query: "Paris".to_owned(),
            radius: Some("25000".to_owned()),
        });
        let params = map_insights_params(&resolved(d));
        assert_eq!(params.get("signal.location.radius"), Some("25000"));
    }

    #[test]
    fn trend_bias_collapses_to_three_levels() {
        let cases = [
            (TrendBias::Trending, Some("high")),
            (TrendBias::VeryTrending, Some("high")),
            (TrendBias::SlightlyTrending, Some("medium")),
            (TrendBias::NotTrending, Some("low")),
        ];
        for (bias, expected) in cases {
            let mut d = descriptor(EntityType::Movie);
            d.trend_bias = bias;
            let params = map_insights_params(&resolved(d));
            assert_eq!(params.get("bias.trends"), expected);
        }
    }

    #[test]
    fn off_trend_bias_is_omitted_and_default_injected() {
        // With no other signal, "off" must not leak a bias of its own; the
        // generic default takes over instead.
        let mut d = descriptor(EntityType::Movie);
        d.trend_bias = TrendBias::Off;
        let params = map_insights_params(&resolved(d));
        assert_eq!(params.get("bias.trends"), Some("medium"));
    }

    #[test]
    fn mapping_is_idempotent() {
        let mut d = descriptor(EntityType::TvShow);
        d.attributes.year = Some("2020".to_owned());
        d.trend_bias = TrendBias::Trending;
        let candidates = ResolvedCandidates {
            entities: vec![hit("E1")],
            tags: vec![hit("T1")],
            audiences: vec![hit("A1")],
        };
        let query = ResolvedQuery::new(d, &candidates);
        let first = map_insights_params(&query);
        let second = map_insights_params(&query);
        assert_eq!(first, second);
        let first_pairs: Vec<_> = first.to_query_pairs();
        let second_pairs: Vec<_> = second.to_query_pairs();
        assert_eq!(first_pairs, second_pairs);
    }
}
