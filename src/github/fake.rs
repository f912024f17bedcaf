//! In-memory metrics source for tests.

use super::{
    Contributor, IssueItem, ItemState, MetricsSource, PullRequest, Release, SearchQuery,
    SourceError, WeeklyCommits,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Canned response: the value, or the HTTP status to fail with.
pub type Canned<T> = Result<T, u16>;

/// Canned sub-resource responses for one repository.
#[derive(Debug, Clone)]
pub struct FakeRepo {
    pub contributors: Canned<Vec<Contributor>>,
    pub pull_requests: Canned<Vec<PullRequest>>,
    pub open_issues: Canned<Vec<IssueItem>>,
    pub closed_issues: Canned<Vec<IssueItem>>,
    pub releases: Canned<Vec<Release>>,
    pub commit_activity: Canned<Vec<WeeklyCommits>>,
}

impl Default for FakeRepo {
    fn default() -> Self {
        Self {
            contributors: Ok(Vec::new()),
            pull_requests: Ok(Vec::new()),
            open_issues: Ok(Vec::new()),
            closed_issues: Ok(Vec::new()),
            releases: Ok(Vec::new()),
            commit_activity: Ok(Vec::new()),
        }
    }
}

/// A recorded call: endpoint, target, and when it started.
#[derive(Debug, Clone)]
pub struct Call {
    pub endpoint: &'static str,
    pub target: String,
    pub at: Instant,
}

#[derive(Default)]
pub struct FakeSource {
    searches: HashMap<String, Canned<Vec<Value>>>,
    repos: HashMap<String, FakeRepo>,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, q: &str, response: Canned<Vec<Value>>) -> Self {
        self.searches.insert(q.to_string(), response);
        self
    }

    pub fn with_repo(mut self, full_name: &str, repo: FakeRepo) -> Self {
        self.repos.insert(full_name.to_string(), repo);
        self
    }

    /// Simulated latency applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint == endpoint)
            .collect()
    }

    async fn record(&self, endpoint: &'static str, target: String) {
        self.calls.lock().unwrap().push(Call {
            endpoint,
            target,
            at: Instant::now(),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn repo(&self, owner: &str, name: &str) -> FakeRepo {
        self.repos
            .get(&format!("{}/{}", owner, name))
            .cloned()
            .unwrap_or_default()
    }
}

fn canned<T: Clone>(response: &Canned<T>, target: &str) -> Result<T, SourceError> {
    response.clone().map_err(|status| SourceError::Status {
        url: target.to_string(),
        status,
        body: "canned failure".to_string(),
    })
}

#[async_trait]
impl MetricsSource for FakeSource {
    async fn search_repositories(&self, query: &SearchQuery) -> Result<Vec<Value>, SourceError> {
        self.record("search", query.q.clone()).await;
        match self.searches.get(&query.q) {
            Some(response) => canned(response, &query.q),
            None => Ok(Vec::new()),
        }
    }

    async fn contributors(&self, owner: &str, name: &str) -> Result<Vec<Contributor>, SourceError> {
        let target = format!("{}/{}", owner, name);
        self.record("contributors", target.clone()).await;
        canned(&self.repo(owner, name).contributors, &target)
    }

    async fn pull_requests(
        &self,
        owner: &str,
        name: &str,
        _state: ItemState,
    ) -> Result<Vec<PullRequest>, SourceError> {
        let target = format!("{}/{}", owner, name);
        self.record("pulls", target.clone()).await;
        canned(&self.repo(owner, name).pull_requests, &target)
    }

    async fn issues(
        &self,
        owner: &str,
        name: &str,
        state: ItemState,
        _per_page: u32,
    ) -> Result<Vec<IssueItem>, SourceError> {
        let target = format!("{}/{}", owner, name);
        self.record("issues", target.clone()).await;
        let repo = self.repo(owner, name);
        match state {
            ItemState::Closed => canned(&repo.closed_issues, &target),
            _ => canned(&repo.open_issues, &target),
        }
    }

    async fn releases(&self, owner: &str, name: &str) -> Result<Vec<Release>, SourceError> {
        let target = format!("{}/{}", owner, name);
        self.record("releases", target.clone()).await;
        canned(&self.repo(owner, name).releases, &target)
    }

    async fn commit_activity(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<WeeklyCommits>, SourceError> {
        let target = format!("{}/{}", owner, name);
        self.record("commit_activity", target.clone()).await;
        canned(&self.repo(owner, name).commit_activity, &target)
    }
}
