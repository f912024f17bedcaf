//! Markdown report generation.
//!
//! This module renders the top of a ranked list, together with the
//! narrative and any diagram, as Markdown or JSON.

use crate::agent::PipelineResponse;
use crate::error::PipelineError;
use crate::models::{EnrichedRepository, Metric};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Run information shown at the top of a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub query: String,
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
    /// Repositories in the full ranking, before truncation to the top N.
    pub repositories_ranked: usize,
    pub duration_seconds: f64,
}

/// A rendered view of one pipeline response.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub narrative: String,
    pub repositories: Vec<EnrichedRepository>,
    pub diagram: Option<PathBuf>,
    pub error: Option<PipelineError>,
}

impl Report {
    /// Build a report over the first `top_n` ranked repositories.
    pub fn from_response(metadata: ReportMetadata, response: &PipelineResponse, top_n: usize) -> Self {
        Self {
            metadata,
            narrative: response.narrative.clone(),
            repositories: response.repositories.top(top_n).to_vec(),
            diagram: response.diagram.clone(),
            error: response.error.clone(),
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Repository Recommendations\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    if !report.narrative.is_empty() {
        output.push_str("## Summary\n\n");
        output.push_str(report.narrative.trim());
        output.push_str("\n\n");
    }

    if let Some(ref diagram) = report.diagram {
        output.push_str("## Class Diagram\n\n");
        output.push_str(&format!("![Class diagram]({})\n\n", diagram.display()));
    }

    output.push_str(&generate_repositories_section(&report.repositories));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Query:** {}\n", metadata.query));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Repositories Ranked:** {}\n",
        metadata.repositories_ranked
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_repositories_section(repositories: &[EnrichedRepository]) -> String {
    let mut section = String::new();

    section.push_str("## Top Repositories\n\n");

    if repositories.is_empty() {
        section.push_str("No repositories matched this query.\n\n");
        return section;
    }

    for (i, repo) in repositories.iter().enumerate() {
        section.push_str(&generate_repository_block(i + 1, repo));
    }

    section
}

fn metric_or_unknown<T>(metric: &Metric<T>, render: impl Fn(&T) -> String) -> String {
    metric
        .available()
        .map(render)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Generate the block for a single ranked repository.
fn generate_repository_block(rank: usize, repo: &EnrichedRepository) -> String {
    let mut block = String::new();
    let candidate = &repo.candidate;

    block.push_str(&format!("### {}. {}\n\n", rank, repo.full_name()));

    if let Some(ref description) = candidate.description {
        block.push_str(&format!("{}\n\n", description));
    }

    block.push_str("| Metric | Value |\n");
    block.push_str("|:---|:---|\n");
    block.push_str(&format!("| Stars | {} |\n", candidate.stars));
    block.push_str(&format!(
        "| Contributors | {} |\n",
        metric_or_unknown(&repo.contributors, |c| c.to_string())
    ));
    block.push_str(&format!(
        "| Language | {} |\n",
        candidate.language.as_deref().unwrap_or("Mixed")
    ));
    block.push_str(&format!(
        "| Last Updated | {} ({} days ago) |\n",
        repo.updated_at.format("%Y-%m-%d"),
        repo.days_since_update
    ));
    block.push_str(&format!(
        "| Open PRs | {} |\n",
        metric_or_unknown(&repo.pull_requests, |pr| pr.open.to_string())
    ));
    block.push_str(&format!(
        "| Avg Merge Time | {} |\n",
        repo.avg_merge_days()
            .map(|d| format!("{:.1} days", d))
            .unwrap_or_else(|| "Unknown".to_string())
    ));
    block.push_str(&format!(
        "| Commit Activity | {} |\n",
        metric_or_unknown(&repo.commit_activity, |c| c.level.to_string())
    ));
    block.push_str(&format!(
        "| Latest Release | {} |\n",
        metric_or_unknown(&repo.releases, |r| r
            .latest_tag
            .clone()
            .unwrap_or_else(|| "None".to_string()))
    ));
    if let Some(ref license) = repo.details.license {
        block.push_str(&format!("| License | {} |\n", license));
    }
    block.push_str(&format!("| Score | {:.0} |\n\n", repo.score.unwrap_or(0.0)));

    if repo.details.archived {
        block.push_str("> **Archived:** this repository is read-only.\n\n");
    }

    block.push_str(&format!("**URL:** {}\n\n", repo.details.url));
    block.push_str("---\n\n");

    block
}

fn generate_footer() -> String {
    format!(
        "*Report generated by repofinder v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::rank;
    use crate::models::{Candidate, PullRequestMetrics, RankedList, RepositoryDetails};
    use serde_json::json;

    fn repo(id: u64, name: &str, stars: u64) -> EnrichedRepository {
        EnrichedRepository {
            candidate: Candidate::from_search_item(json!({
                "id": id,
                "name": name,
                "full_name": format!("acme/{}", name),
                "owner": {"login": "acme"},
                "description": format!("The {} project", name),
                "language": "Rust",
                "stargazers_count": stars,
            }))
            .unwrap(),
            details: RepositoryDetails {
                url: format!("https://github.com/acme/{}", name),
                forks: 3,
                watchers: 4,
                size: 100,
                default_branch: Some("main".to_string()),
                license: Some("MIT License".to_string()),
                topics: vec!["cli".to_string()],
                archived: false,
            },
            updated_at: Utc::now(),
            days_since_update: 2,
            contributors: Metric::Available(12),
            pull_requests: Metric::Available(PullRequestMetrics {
                open: 4,
                avg_merge_days: Some(2.4),
                merge_rate: 0.5,
                total: 8,
            }),
            issues: Metric::Unavailable,
            releases: Metric::Unavailable,
            commit_activity: Metric::Unavailable,
            score: None,
        }
    }

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            query: "rust cli parser".to_string(),
            generated_at: Utc::now(),
            model_used: "test-model".to_string(),
            repositories_ranked: 4,
            duration_seconds: 3.5,
        }
    }

    fn response(repositories: RankedList) -> PipelineResponse {
        PipelineResponse {
            narrative: "These are great.".to_string(),
            repositories,
            diagram: None,
            error: None,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let ranked = rank(vec![
            repo(1, "alpha", 100),
            repo(2, "beta", 9_000),
            repo(3, "gamma", 50),
            repo(4, "delta", 10),
        ]);
        let report = Report::from_response(metadata(), &response(ranked), 3);
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Repository Recommendations"));
        assert!(markdown.contains("- **Query:** rust cli parser"));
        assert!(markdown.contains("These are great."));
        assert!(markdown.contains("### 1. acme/beta"));
        assert!(markdown.contains("### 3. acme/gamma"));
        assert!(!markdown.contains("acme/delta"));
        assert!(markdown.contains("| Avg Merge Time | 2.4 days |"));
        assert!(markdown.contains("| Open PRs | 4 |"));
        assert!(!markdown.contains("## Class Diagram"));
    }

    #[test]
    fn test_unavailable_metrics_render_as_unknown() {
        let mut r = repo(1, "alpha", 100);
        r.contributors = Metric::Unavailable;
        r.pull_requests = Metric::Unavailable;

        let block = generate_repository_block(1, &r);
        assert!(block.contains("| Contributors | Unknown |"));
        assert!(block.contains("| Open PRs | Unknown |"));
        assert!(block.contains("| Avg Merge Time | Unknown |"));
        assert!(block.contains("https://github.com/acme/alpha"));
    }

    #[test]
    fn test_empty_report() {
        let report = Report::from_response(metadata(), &response(RankedList::default()), 3);
        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("No repositories matched this query."));
    }

    #[test]
    fn test_diagram_section() {
        let mut resp = response(RankedList::default());
        resp.diagram = Some(PathBuf::from("/tmp/alpha.png"));
        let report = Report::from_response(metadata(), &resp, 3);
        assert!(generate_markdown_report(&report).contains("![Class diagram](/tmp/alpha.png)"));
    }

    #[test]
    fn test_generate_json_report() {
        let mut resp = response(rank(vec![repo(1, "alpha", 100)]));
        resp.error = Some(PipelineError::NoCandidates);
        let report = Report::from_response(metadata(), &resp, 3);
        let json = generate_json_report(&report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["query"], "rust cli parser");
        assert_eq!(value["repositories"][0]["candidate"]["full_name"], "acme/alpha");
        assert_eq!(value["repositories"][0]["contributors"]["value"], 12);
        assert_eq!(value["error"]["kind"], "no_candidates");
    }
}
