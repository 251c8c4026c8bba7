//! Identifier resolution: free-text query terms → opaque vendor candidates.
//!
//! Walks the descriptor's keywords through entity and tag search, and its
//! audience keywords through parent-type-scoped audience search. Demographic
//! vocabulary is inherently fuzzy, so audience resolution broadens
//! progressively instead of failing: declared parent type, then a fixed
//! ladder of alternate parent types, then one unscoped listing.
//!
//! Resolution never errors. Individual search failures are logged and
//! skipped; the pipeline continues with whatever resolved, down to nothing.
//!
//! The entity and tag lookups for one keyword run concurrently (they are
//! independent), but keywords are processed in order so the merged candidate
//! lists are deterministic: keyword order first, result order second.

use tracing::{debug, warn};

use crate::analyzer::{AudienceParentType, QueryDescriptor};
use crate::qloo::{CulturalSearch, QlooError, SearchHit};

/// How many leading keywords are resolved.
pub const KEYWORD_LIMIT: usize = 3;

/// How many leading audience keywords are resolved.
pub const AUDIENCE_KEYWORD_LIMIT: usize = 2;

/// How many hits are kept per keyword per category.
pub const HITS_PER_KEYWORD: usize = 2;

/// Result count requested from entity and tag search.
const SEARCH_REQUEST: u32 = 5;

/// Result count requested from parent-scoped audience search.
const AUDIENCE_REQUEST: u32 = 15;

/// Result count requested per rung of the broadening ladder.
const LADDER_REQUEST: u32 = 5;

/// Result count requested from the unscoped last-resort call.
const UNSCOPED_REQUEST: u32 = 10;

/// How many unscoped audiences are kept as the last resort.
const UNSCOPED_KEEP: usize = 3;

/// Alternate parent types tried, in order, when nothing matched.
const BROADENING_LADDER: [AudienceParentType; 4] = [
    AudienceParentType::LifeStage,
    AudienceParentType::ProfessionalArea,
    AudienceParentType::HobbiesAndInterests,
    AudienceParentType::Leisure,
];

/// Candidates resolved from the search service, pre-ID-extraction.
///
/// Lists are accumulated without deduplication — dedup happens when the
/// resolved query is assembled at parameter-mapping time.
#[derive(Debug, Clone, Default)]
pub struct ResolvedCandidates {
    /// Entity candidates, keyword order then result order.
    pub entities: Vec<SearchHit>,
    /// Tag candidates, keyword order then result order.
    pub tags: Vec<SearchHit>,
    /// Audience candidates.
    pub audiences: Vec<SearchHit>,
}

/// Resolve a descriptor's free-text terms into vendor candidates.
///
/// Never fails; partial resolution (including empty) is a legitimate
/// outcome the pipeline continues with.
pub async fn resolve(
    search: &dyn CulturalSearch,
    descriptor: &QueryDescriptor,
) -> ResolvedCandidates {
    let mut candidates = ResolvedCandidates::default();

    for keyword in descriptor.keywords.iter().take(KEYWORD_LIMIT) {
        let (entities, tags) = tokio::join!(
            search.search_entities(keyword, descriptor.entity_type, SEARCH_REQUEST),
            search.search_tags(keyword, SEARCH_REQUEST),
        );
        append_hits(&mut candidates.entities, entities, keyword, "entity");
        append_hits(&mut candidates.tags, tags, keyword, "tag");
    }

    // Audience resolution — including the broadening ladder — only runs when
    // the analyzer emitted audience keywords at all. Descriptors with an
    // empty audience list (the destination/place contract) stay empty no
    // matter what the search service would return.
    if !descriptor.interest_audiences.is_empty() {
        resolve_audiences(search, descriptor, &mut candidates.audiences).await;
    }

    debug!(
        entities = candidates.entities.len(),
        tags = candidates.tags.len(),
        audiences = candidates.audiences.len(),
        "identifier resolution finished"
    );
    candidates
}

fn append_hits(
    accumulated: &mut Vec<SearchHit>,
    result: Result<Vec<SearchHit>, QlooError>,
    keyword: &str,
    category: &str,
) {
    match result {
        Ok(hits) => {
            accumulated.extend(hits.into_iter().take(HITS_PER_KEYWORD));
        }
        Err(e) => {
            warn!(keyword, category, error = %e, "search failed, continuing");
        }
    }
}

async fn resolve_audiences(
    search: &dyn CulturalSearch,
    descriptor: &QueryDescriptor,
    audiences: &mut Vec<SearchHit>,
) {
    for audience in descriptor
        .interest_audiences
        .iter()
        .take(AUDIENCE_KEYWORD_LIMIT)
    {
        let hits = match search
            .audiences_by_parent(audience.parent_type, AUDIENCE_REQUEST)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(
                    keyword = %audience.keyword,
                    error = %e,
                    "audience search failed, continuing"
                );
                continue;
            }
        };

        let keyword_lower = audience.keyword.to_lowercase();
        let matching: Vec<SearchHit> = hits
            .iter()
            .filter(|hit| hit.name.to_lowercase().contains(&keyword_lower))
            .cloned()
            .collect();

        if matching.is_empty() {
            // No name match in the bucket — take its top entries unfiltered.
            audiences.extend(hits.into_iter().take(HITS_PER_KEYWORD));
        } else {
            audiences.extend(matching.into_iter().take(HITS_PER_KEYWORD));
        }
    }

    if !audiences.is_empty() {
        return;
    }

    // Broaden through alternate parent types, stopping at the first rung
    // that yields anything.
    for parent in BROADENING_LADDER {
        match search.audiences_by_parent(parent, LADDER_REQUEST).await {
            Ok(hits) if !hits.is_empty() => {
                audiences.extend(hits.into_iter().take(HITS_PER_KEYWORD));
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(parent = parent.urn(), error = %e, "broadened audience search failed");
            }
        }
    }

    // Last resort: one unscoped listing.
    match search.audiences_unscoped(UNSCOPED_REQUEST).await {
        Ok(hits) => audiences.extend(hits.into_iter().take(UNSCOPED_KEEP)),
        Err(e) => {
            warn!(error = %e, "unscoped audience listing failed");
        }
    }
}
