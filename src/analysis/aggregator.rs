//! Candidate aggregation.
//!
//! This module fans the interpreted search terms out into GitHub searches
//! and merges the results into one deduplicated, bounded candidate set.

use crate::error::PipelineError;
use crate::github::{MetricsSource, SearchQuery};
use crate::models::Candidate;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Search parameters for one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Results requested per search term.
    pub per_page: u32,
    /// Upper bound on merged candidates.
    pub max_candidates: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            per_page: 20,
            max_candidates: 30,
        }
    }
}

/// Append the language qualifier to a search term, if one was requested.
pub fn build_search_query(term: &str, language: Option<&str>) -> String {
    match language {
        Some(lang) if !lang.trim().is_empty() => format!("{} language:{}", term, lang.trim()),
        _ => term.to_string(),
    }
}

/// Merge search batches keyed by repository id.
///
/// A repeated id overwrites the earlier value but keeps the position where
/// the id was first seen. The result is truncated to `max`.
pub fn merge_candidates<I>(batches: I, max: usize) -> Vec<Candidate>
where
    I: IntoIterator<Item = Vec<Candidate>>,
{
    let mut merged: Vec<Candidate> = Vec::new();
    let mut positions: HashMap<u64, usize> = HashMap::new();

    for candidate in batches.into_iter().flatten() {
        match positions.get(&candidate.id) {
            Some(&pos) => merged[pos] = candidate,
            None => {
                positions.insert(candidate.id, merged.len());
                merged.push(candidate);
            }
        }
    }

    merged.truncate(max);
    merged
}

/// Run one search per term and merge the results.
///
/// Fails only when every search call fails; a single successful term is
/// enough to produce candidates.
pub async fn aggregate_candidates(
    source: &dyn MetricsSource,
    terms: &[String],
    language: Option<&str>,
    settings: &SearchSettings,
) -> Result<Vec<Candidate>, PipelineError> {
    if terms.is_empty() {
        return Err(PipelineError::Search {
            attempted: 0,
            last_error: "no search terms".to_string(),
        });
    }

    let queries: Vec<SearchQuery> = terms
        .iter()
        .map(|term| SearchQuery::by_stars(build_search_query(term, language), settings.per_page))
        .collect();

    let results = join_all(queries.iter().map(|q| source.search_repositories(q))).await;

    let mut batches = Vec::new();
    let mut last_error = None;

    for (query, result) in queries.iter().zip(results) {
        match result {
            Ok(items) => {
                debug!("Search '{}' returned {} items", query.q, items.len());
                let candidates: Vec<Candidate> = items
                    .into_iter()
                    .filter_map(Candidate::from_search_item)
                    .collect();
                batches.push(candidates);
            }
            Err(e) => {
                warn!("Search '{}' failed: {}", query.q, e);
                last_error = Some(e.to_string());
            }
        }
    }

    if batches.is_empty() {
        return Err(PipelineError::Search {
            attempted: queries.len(),
            last_error: last_error.unwrap_or_default(),
        });
    }

    let merged = merge_candidates(batches, settings.max_candidates);
    info!(
        "Aggregated {} unique candidates from {} search term(s)",
        merged.len(),
        terms.len()
    );

    Ok(merged)
}
