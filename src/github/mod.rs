//! GitHub metrics source.
//!
//! The pipeline only talks to GitHub through the [`MetricsSource`] trait so
//! the aggregator and enricher can be exercised against in-memory sources.

pub mod client;
#[cfg(test)]
pub mod fake;

pub use client::{GitHubClient, GitHubClientConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Failure of a single call against the metrics source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GitHub API error {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Parameters of one repository search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub sort: String,
    pub order: String,
    pub per_page: u32,
}

impl SearchQuery {
    /// Search `q` sorted by stars, most starred first.
    pub fn by_stars(q: impl Into<String>, per_page: u32) -> Self {
        Self {
            q: q.into(),
            sort: "stars".to_string(),
            order: "desc".to_string(),
            per_page,
        }
    }
}

/// State filter for pull request and issue listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Open,
    Closed,
    All,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Open => "open",
            ItemState::Closed => "closed",
            ItemState::All => "all",
        }
    }
}

/// An entry of the contributors listing. Only the number of entries is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Contributor {}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub state: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

/// An entry of the issues listing. GitHub returns PRs here too, marked
/// by a `pull_request` object.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueItem {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

impl IssueItem {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.as_ref().is_some_and(|v| !v.is_null())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// One week of the commit activity statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct WeeklyCommits {
    pub total: u64,
}

/// Read-only view of the repository hosting API.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Search repositories; returns the raw items.
    async fn search_repositories(&self, query: &SearchQuery) -> Result<Vec<Value>, SourceError>;

    /// First page of contributors. Empty for an empty repository.
    async fn contributors(&self, owner: &str, name: &str) -> Result<Vec<Contributor>, SourceError>;

    async fn pull_requests(
        &self,
        owner: &str,
        name: &str,
        state: ItemState,
    ) -> Result<Vec<PullRequest>, SourceError>;

    async fn issues(
        &self,
        owner: &str,
        name: &str,
        state: ItemState,
        per_page: u32,
    ) -> Result<Vec<IssueItem>, SourceError>;

    /// Most recent releases, newest first. Empty when the repository has none.
    async fn releases(&self, owner: &str, name: &str) -> Result<Vec<Release>, SourceError>;

    /// Weekly commit totals for the last year. Empty while GitHub is still
    /// computing the statistics or for an empty repository.
    async fn commit_activity(&self, owner: &str, name: &str)
        -> Result<Vec<WeeklyCommits>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_query_by_stars() {
        let query = SearchQuery::by_stars("web framework language:rust", 20);
        assert_eq!(query.sort, "stars");
        assert_eq!(query.order, "desc");
        assert_eq!(query.per_page, 20);
    }

    #[test]
    fn test_issue_item_pull_request_marker() {
        let issue: IssueItem = serde_json::from_value(json!({
            "created_at": "2024-01-01T00:00:00Z",
            "closed_at": null
        }))
        .unwrap();
        assert!(!issue.is_pull_request());

        let pr: IssueItem = serde_json::from_value(json!({
            "created_at": "2024-01-01T00:00:00Z",
            "pull_request": {"url": "https://api.github.com/repos/o/n/pulls/1"}
        }))
        .unwrap();
        assert!(pr.is_pull_request());
    }

    #[test]
    fn test_release_without_publish_date() {
        let release: Release =
            serde_json::from_value(json!({"tag_name": "v1.0.0", "published_at": null})).unwrap();
        assert_eq!(release.tag_name, "v1.0.0");
        assert!(release.published_at.is_none());
    }
}
