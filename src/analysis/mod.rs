//! Analysis stages.
//!
//! Candidate aggregation, concurrent enrichment, and composite scoring.

pub mod aggregator;
pub mod enricher;
pub mod scoring;

pub use aggregator::{aggregate_candidates, SearchSettings};
pub use enricher::{Enricher, EnrichmentSettings};
pub use scoring::rank;
