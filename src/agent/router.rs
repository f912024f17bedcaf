//! Request routing.
//!
//! Decides once per request whether to run a fresh search or to reuse the
//! caller's stored ranking for a diagram.

use crate::error::PipelineError;
use crate::models::{EnrichedRepository, RankedList};

/// Words that send a request down the diagram branch.
pub const DIAGRAM_KEYWORDS: [&str; 5] = ["diagram", "draw", "show", "visualize", "visualise"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Search,
    Diagram,
}

/// Classify a request by keyword. Matching is substring-based on the
/// lowercased text, so "drawing" and "showcase" count too.
pub fn classify_intent(text: &str) -> Intent {
    let lowered = text.to_lowercase();
    if DIAGRAM_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Intent::Diagram
    } else {
        Intent::Search
    }
}

/// Position in the stored ranking a request refers to.
///
/// Ordinals are matched as whole tokens; anything else means the top entry.
pub fn ordinal_index(text: &str) -> usize {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.iter().any(|t| matches!(*t, "second" | "2nd" | "2")) {
        1
    } else if tokens.iter().any(|t| matches!(*t, "third" | "3rd" | "3")) {
        2
    } else {
        0
    }
}

/// Pick the stored repository at `index`.
pub fn select_stored(
    stored: Option<&RankedList>,
    index: usize,
) -> Result<&EnrichedRepository, PipelineError> {
    let available = stored.map_or(0, RankedList::len);
    stored
        .and_then(|list| list.get(index))
        .ok_or(PipelineError::DiagramUnavailable { index, available })
}
