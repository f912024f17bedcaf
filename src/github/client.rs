//! GitHub REST API client.
//!
//! A thin reqwest wrapper: one method per endpoint the enricher needs,
//! with the per-endpoint quirks (204 on empty repos, 404 on no releases,
//! 202 while statistics are being computed) folded into empty results.

use super::{
    Contributor, IssueItem, ItemState, MetricsSource, PullRequest, Release, SearchQuery,
    SourceError, WeeklyCommits,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for the GitHub client.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub api_url: String,
    /// Optional token; raises the rate limit.
    pub token: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Pause before retrying a 202 from the commit statistics endpoint.
    pub stats_retry_delay: Duration,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token: None,
            timeout_seconds: 30,
            user_agent: format!("repofinder/{}", env!("CARGO_PKG_VERSION")),
            stats_retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Value>,
}

/// GitHub implementation of [`MetricsSource`].
pub struct GitHubClient {
    http: reqwest::Client,
    config: GitHubClientConfig,
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }
        if let Some(ref token) = config.token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("GitHub token contains invalid header characters; ignoring it"),
            }
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(SourceError::Client)?;

        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// Issue a GET and return the response without checking its status.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response, SourceError> {
        let url = self.endpoint(path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| SourceError::Transport {
                url: url.clone(),
                source,
            })?;

        if let Some(remaining) = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
        {
            debug!("GitHub rate limit remaining: {}", remaining);
        }

        Ok(response)
    }

    /// Fail on non-success statuses, otherwise decode the JSON body.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SourceError> {
        let url = response.url().to_string();
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|source| SourceError::Decode { url, source })
    }
}

fn repo_path(owner: &str, name: &str, rest: &str) -> String {
    format!("/repos/{}/{}/{}", owner, name, rest)
}

#[async_trait]
impl MetricsSource for GitHubClient {
    async fn search_repositories(&self, query: &SearchQuery) -> Result<Vec<Value>, SourceError> {
        let response = self
            .get(
                "/search/repositories",
                &[
                    ("q", query.q.clone()),
                    ("sort", query.sort.clone()),
                    ("order", query.order.clone()),
                    ("per_page", query.per_page.to_string()),
                ],
            )
            .await?;

        let body: SearchResponse = Self::decode(response).await?;
        Ok(body.items)
    }

    async fn contributors(&self, owner: &str, name: &str) -> Result<Vec<Contributor>, SourceError> {
        let response = self
            .get(
                &repo_path(owner, name, "contributors"),
                &[("per_page", "100".to_string())],
            )
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        Self::decode(response).await
    }

    async fn pull_requests(
        &self,
        owner: &str,
        name: &str,
        state: ItemState,
    ) -> Result<Vec<PullRequest>, SourceError> {
        let response = self
            .get(
                &repo_path(owner, name, "pulls"),
                &[
                    ("state", state.as_str().to_string()),
                    ("per_page", "100".to_string()),
                    ("sort", "updated".to_string()),
                    ("direction", "desc".to_string()),
                ],
            )
            .await?;
        Self::decode(response).await
    }

    async fn issues(
        &self,
        owner: &str,
        name: &str,
        state: ItemState,
        per_page: u32,
    ) -> Result<Vec<IssueItem>, SourceError> {
        let response = self
            .get(
                &repo_path(owner, name, "issues"),
                &[
                    ("state", state.as_str().to_string()),
                    ("per_page", per_page.to_string()),
                ],
            )
            .await?;
        Self::decode(response).await
    }

    async fn releases(&self, owner: &str, name: &str) -> Result<Vec<Release>, SourceError> {
        let response = self
            .get(
                &repo_path(owner, name, "releases"),
                &[("per_page", "10".to_string())],
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        Self::decode(response).await
    }

    async fn commit_activity(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<WeeklyCommits>, SourceError> {
        let path = repo_path(owner, name, "stats/commit_activity");
        let mut response = self.get(&path, &[]).await?;

        if response.status() == StatusCode::ACCEPTED {
            debug!(
                "Commit statistics for {}/{} are being computed, retrying in {:?}",
                owner, name, self.config.stats_retry_delay
            );
            tokio::time::sleep(self.config.stats_retry_delay).await;
            response = self.get(&path, &[]).await?;
        }

        match response.status() {
            StatusCode::ACCEPTED => {
                debug!("Commit statistics for {}/{} still not ready", owner, name);
                Ok(Vec::new())
            }
            StatusCode::NO_CONTENT => Ok(Vec::new()),
            _ => Self::decode(response).await,
        }
    }
}
