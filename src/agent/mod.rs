//! LLM-driven request handling.
//!
//! This module provides the language model seam, query interpretation,
//! request routing, and the pipeline state machine that ties them together.

#[cfg(test)]
pub mod fake;
pub mod interpreter;
pub mod llm;
pub mod pipeline;
pub mod router;

pub use llm::{LanguageModel, LlmConfig, OllamaClient};
pub use pipeline::{PipelineRequest, PipelineResponse, RepositoryPipeline};
