//! Query interpretation and narrative responses.
//!
//! These are the two fixed points where the pipeline consults the language
//! model. Both degrade locally: an unusable interpretation falls back to the
//! raw query text, and a failed narrative falls back to a plain summary.

use crate::agent::llm::LanguageModel;
use crate::error::ParseError;
use crate::models::EnrichedRepository;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Shown when a search produced no ranked repositories.
pub const NO_RESULTS_MESSAGE: &str =
    "I couldn't find any repositories matching your criteria. Try refining your search terms.";

/// Structured form of a free-text request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl SearchPlan {
    /// The whole query as a single term, no language filter.
    pub fn fallback(query: &str) -> Self {
        Self {
            search_terms: vec![query.trim().to_string()],
            language: None,
            requirements: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    search_terms: Vec<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    requirements: Vec<String>,
}

/// Parse interpreter output into a plan.
///
/// Accepts a bare JSON object or one wrapped in prose or code fences.
pub fn parse_search_plan(content: &str) -> Result<SearchPlan, ParseError> {
    let start = content.find('{').ok_or(ParseError::NoJson)?;
    let end = content.rfind('}').ok_or(ParseError::NoJson)?;
    if end < start {
        return Err(ParseError::NoJson);
    }

    let raw: RawPlan = serde_json::from_str(&content[start..=end])?;

    let search_terms: Vec<String> = raw
        .search_terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if search_terms.is_empty() {
        return Err(ParseError::NoSearchTerms);
    }

    let language = raw
        .language
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty());

    Ok(SearchPlan {
        search_terms,
        language,
        requirements: raw.requirements,
    })
}

/// Turn a free-text request into a search plan. Never fails.
pub async fn interpret_query(llm: &dyn LanguageModel, query: &str) -> SearchPlan {
    let user = format!("User query: {}", query);

    let content = match llm.complete(INTERPRET_SYSTEM_PROMPT, &user).await {
        Ok(content) => content,
        Err(e) => {
            warn!("Query interpretation failed, searching for the raw query: {}", e);
            return SearchPlan::fallback(query);
        }
    };

    match parse_search_plan(&content) {
        Ok(plan) => {
            info!(
                "Interpreted query into {} search term(s), language: {}",
                plan.search_terms.len(),
                plan.language.as_deref().unwrap_or("any")
            );
            plan
        }
        Err(e) => {
            warn!("Unusable interpreter output ({}), searching for the raw query", e);
            debug!("Interpreter output: {}", content);
            SearchPlan::fallback(query)
        }
    }
}

fn format_days(days: Option<f64>) -> String {
    days.map(|d| format!("{:.1} days", d))
        .unwrap_or_else(|| "Unknown".to_string())
}

fn format_count(count: Option<u64>) -> String {
    count
        .map(|c| c.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Metrics of one repository as shown to the narrative model.
fn repository_summary(rank: usize, repo: &EnrichedRepository) -> String {
    format!(
        "Repository #{}: {}\n\
         - Stars: {}\n\
         - Contributors: {}\n\
         - Language: {}\n\
         - Last updated: {} days ago\n\
         - Average PR merge time: {}\n\
         - Description: {}\n",
        rank,
        repo.full_name(),
        repo.candidate.stars,
        format_count(repo.contributors.available().copied()),
        repo.candidate.language.as_deref().unwrap_or("Mixed"),
        repo.days_since_update,
        format_days(repo.avg_merge_days()),
        repo.candidate
            .description
            .as_deref()
            .unwrap_or("No description"),
    )
}

/// Plain summary used when the narrative model is unavailable.
pub fn summarize_locally(top: &[EnrichedRepository]) -> String {
    let mut text = format!("Here are the top {} repositories I found:\n\n", top.len());
    for (i, repo) in top.iter().enumerate() {
        text.push_str(&format!(
            "{}. **{}** ({} stars, score {:.0}): {}\n",
            i + 1,
            repo.full_name(),
            repo.candidate.stars,
            repo.score.unwrap_or(0.0),
            repo.candidate
                .description
                .as_deref()
                .unwrap_or("No description"),
        ));
    }
    text
}

/// Explain the top-ranked repositories in prose.
pub async fn narrate(llm: &dyn LanguageModel, query: &str, top: &[EnrichedRepository]) -> String {
    if top.is_empty() {
        return NO_RESULTS_MESSAGE.to_string();
    }

    let summaries: Vec<String> = top
        .iter()
        .enumerate()
        .map(|(i, repo)| repository_summary(i + 1, repo))
        .collect();

    let user = format!(
        "User was looking for: {}\n\nTop repositories found:\n{}\n\
         Please provide a conversational explanation of these recommendations.",
        query,
        summaries.join("\n")
    );

    match llm.complete(NARRATIVE_SYSTEM_PROMPT, &user).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!("Narrative model returned an empty response");
            summarize_locally(top)
        }
        Err(e) => {
            warn!("Narrative generation failed: {}", e);
            summarize_locally(top)
        }
    }
}

const INTERPRET_SYSTEM_PROMPT: &str = r#"You convert developer needs into GitHub repository search terms.

From the user's request, identify:
1. Primary technology or framework keywords
2. Programming language preference
3. Specific features or use cases
4. Project type (library, framework, tool, ...)

Reply with ONLY a JSON object:
{"search_terms": ["..."], "language": "python" or null, "requirements": ["..."]}

Example request: "I need a Python web framework for building REST APIs"
Example reply: {"search_terms": ["web framework", "REST API"], "language": "python", "requirements": ["REST API support"]}"#;

const NARRATIVE_SYSTEM_PROMPT: &str = r#"You explain GitHub repository recommendations.

Given the top repositories and their metrics, explain conversationally:
1. Why these repositories match the request
2. The key strengths of the top recommendation
3. How the top options compare

Be informative and focus on the metrics developers care about."#;
