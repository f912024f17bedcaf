//! The find/enrich/rank pipeline.
//!
//! Each request walks a linear state machine. Every [`Stage`] variant
//! carries exactly what the next step needs, so no stage can read data a
//! previous stage did not produce.

use crate::agent::interpreter::{interpret_query, narrate, SearchPlan, NO_RESULTS_MESSAGE};
use crate::agent::llm::LanguageModel;
use crate::agent::router::{classify_intent, ordinal_index, select_stored, Intent};
use crate::analysis::{aggregate_candidates, rank, Enricher, SearchSettings};
use crate::diagram::DiagramAuthor;
use crate::error::PipelineError;
use crate::github::MetricsSource;
use crate::models::{Candidate, EnrichedRepository, RankedList};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Shown when a diagram request has nothing stored to draw.
pub const NO_REPOSITORIES_AVAILABLE: &str =
    "No repositories available for diagram generation. Please search for repositories first.";

/// Repositories handed to the narrative responder.
const NARRATED_REPOSITORIES: usize = 3;

/// One request into the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub query: String,
    pub session_id: String,
    /// Ranking from an earlier search turn, used by diagram requests.
    pub previous: Option<RankedList>,
}

/// Result of one request. Always produced, even when stages fail.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResponse {
    pub narrative: String,
    pub repositories: RankedList,
    pub diagram: Option<PathBuf>,
    pub error: Option<PipelineError>,
}

/// What the response stage has to describe.
#[derive(Debug)]
enum Outcome {
    Ranked(RankedList),
    NoResults(PipelineError),
    Diagram {
        repository: String,
        diagram: Option<PathBuf>,
    },
    DiagramUnavailable(PipelineError),
}

#[derive(Debug)]
enum Stage {
    /// Routes on the raw text, then interprets search requests only.
    /// Keywords and ordinals are read from the user's own words, so a
    /// diagram request goes straight to `GenerateDiagram` without an
    /// interpretation call.
    ParseQuery,
    SearchRepositories(SearchPlan),
    AnalyzeRepositories(Vec<Candidate>),
    RankRepositories(Vec<EnrichedRepository>),
    GenerateDiagram(usize),
    GenerateResponse(Outcome),
    Done(PipelineResponse),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::ParseQuery => "parse_query",
            Stage::SearchRepositories(_) => "search_repositories",
            Stage::AnalyzeRepositories(_) => "analyze_repositories",
            Stage::RankRepositories(_) => "rank_repositories",
            Stage::GenerateDiagram(_) => "generate_diagram",
            Stage::GenerateResponse(_) => "generate_response",
            Stage::Done(_) => "done",
        }
    }
}

/// Entry point that wires the collaborators together.
pub struct RepositoryPipeline {
    source: Arc<dyn MetricsSource>,
    llm: Arc<dyn LanguageModel>,
    diagrams: Arc<dyn DiagramAuthor>,
    enricher: Enricher,
    search: SearchSettings,
}

impl RepositoryPipeline {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        llm: Arc<dyn LanguageModel>,
        diagrams: Arc<dyn DiagramAuthor>,
        enricher: Enricher,
        search: SearchSettings,
    ) -> Self {
        Self {
            source,
            llm,
            diagrams,
            enricher,
            search,
        }
    }

    /// Run one request to completion.
    pub async fn handle(&self, request: PipelineRequest) -> PipelineResponse {
        let span = info_span!("pipeline", session = %request.session_id);
        self.run(&request).instrument(span).await
    }

    async fn run(&self, request: &PipelineRequest) -> PipelineResponse {
        let mut stage = Stage::ParseQuery;
        loop {
            debug!("Entering stage {}", stage.name());
            stage = match stage {
                Stage::Done(response) => {
                    info!("Pipeline finished with {} repositories", response.repositories.len());
                    return response;
                }
                other => self.step(other, request).await,
            };
        }
    }

    async fn step(&self, stage: Stage, request: &PipelineRequest) -> Stage {
        match stage {
            Stage::ParseQuery => match classify_intent(&request.query) {
                Intent::Diagram => {
                    let index = ordinal_index(&request.query);
                    info!("Routing to diagram for stored position {}", index);
                    Stage::GenerateDiagram(index)
                }
                Intent::Search => {
                    let plan = interpret_query(self.llm.as_ref(), &request.query).await;
                    info!("Routing to search with terms {:?}", plan.search_terms);
                    if !plan.requirements.is_empty() {
                        debug!("Stated requirements: {:?}", plan.requirements);
                    }
                    Stage::SearchRepositories(plan)
                }
            },

            Stage::SearchRepositories(plan) => {
                match aggregate_candidates(
                    self.source.as_ref(),
                    &plan.search_terms,
                    plan.language.as_deref(),
                    &self.search,
                )
                .await
                {
                    Ok(candidates) if candidates.is_empty() => {
                        warn!("Search returned no candidates");
                        Stage::GenerateResponse(Outcome::NoResults(PipelineError::NoCandidates))
                    }
                    Ok(candidates) => Stage::AnalyzeRepositories(candidates),
                    Err(e) => {
                        warn!("Search failed: {}", e);
                        Stage::GenerateResponse(Outcome::NoResults(e))
                    }
                }
            }

            Stage::AnalyzeRepositories(candidates) => {
                let enriched = self.enricher.enrich(&candidates).await;
                if enriched.is_empty() {
                    warn!("No candidate survived enrichment");
                    Stage::GenerateResponse(Outcome::NoResults(PipelineError::NoCandidates))
                } else {
                    Stage::RankRepositories(enriched)
                }
            }

            Stage::RankRepositories(enriched) => {
                let ranked = rank(enriched);
                if let Some(top) = ranked.get(0) {
                    info!(
                        "Top repository: {} (score {:.0})",
                        top.full_name(),
                        top.score.unwrap_or(0.0)
                    );
                }
                Stage::GenerateResponse(Outcome::Ranked(ranked))
            }

            Stage::GenerateDiagram(index) => {
                match select_stored(request.previous.as_ref(), index) {
                    Ok(repo) => {
                        let diagram = match self.diagrams.diagram(repo).await {
                            Ok(path) => Some(path),
                            Err(e) => {
                                warn!("Diagram for {} failed: {}", repo.full_name(), e);
                                None
                            }
                        };
                        Stage::GenerateResponse(Outcome::Diagram {
                            repository: repo.full_name().to_string(),
                            diagram,
                        })
                    }
                    Err(e) => {
                        warn!("{}", e);
                        Stage::GenerateResponse(Outcome::DiagramUnavailable(e))
                    }
                }
            }

            Stage::GenerateResponse(outcome) => Stage::Done(self.respond(outcome, request).await),

            Stage::Done(response) => Stage::Done(response),
        }
    }

    async fn respond(&self, outcome: Outcome, request: &PipelineRequest) -> PipelineResponse {
        let stored = || request.previous.clone().unwrap_or_default();

        match outcome {
            Outcome::Ranked(ranked) => {
                let narrative = narrate(
                    self.llm.as_ref(),
                    &request.query,
                    ranked.top(NARRATED_REPOSITORIES),
                )
                .await;
                PipelineResponse {
                    narrative,
                    repositories: ranked,
                    diagram: None,
                    error: None,
                }
            }
            Outcome::NoResults(error) => PipelineResponse {
                narrative: NO_RESULTS_MESSAGE.to_string(),
                repositories: RankedList::default(),
                diagram: None,
                error: Some(error),
            },
            Outcome::Diagram {
                repository,
                diagram,
            } => {
                let narrative = match &diagram {
                    Some(path) => format!(
                        "Here's the class diagram for {}: {}",
                        repository,
                        path.display()
                    ),
                    None => format!(
                        "I couldn't generate a class diagram for {}. Please try again.",
                        repository
                    ),
                };
                PipelineResponse {
                    narrative,
                    repositories: stored(),
                    diagram,
                    error: None,
                }
            }
            Outcome::DiagramUnavailable(error) => PipelineResponse {
                narrative: NO_REPOSITORIES_AVAILABLE.to_string(),
                repositories: stored(),
                diagram: None,
                error: Some(error),
            },
        }
    }
}
