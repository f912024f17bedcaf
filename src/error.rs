//! Error types shared by the pipeline stages.
//!
//! Single-call failures against GitHub live in [`crate::github::SourceError`]
//! and LLM transport failures in [`crate::agent::llm::LlmError`]. The types
//! here describe what a whole stage can report back to the caller.

use serde::Serialize;
use thiserror::Error;

/// Failure to turn interpreter output into a search plan.
#[derive(Debug, Error)]
pub enum ParseError {
    /// No JSON object could be located in the response.
    #[error("no JSON object found in interpreter output")]
    NoJson,

    /// A JSON object was found but did not match the expected shape.
    #[error("malformed interpreter output: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The object parsed but carried no usable search terms.
    #[error("interpreter output contained no search terms")]
    NoSearchTerms,
}

/// Recovered failures surfaced on a pipeline response.
///
/// None of these abort the request: each one resolves to a degraded but
/// valid response carrying a fixed user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
    /// Every search term's call failed.
    #[error("all {attempted} search request(s) failed: {last_error}")]
    Search { attempted: usize, last_error: String },

    /// Search succeeded but nothing survived aggregation and enrichment.
    #[error("no candidate repositories matched the query")]
    NoCandidates,

    /// The diagram branch had no stored repository at the requested position.
    #[error("no stored repository at position {index} (stored: {available})")]
    DiagramUnavailable { index: usize, available: usize },
}
