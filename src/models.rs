//! Data models for the repository finder.
//!
//! This module contains the core data structures that flow through the
//! pipeline: search candidates, enriched repositories with their metric
//! groups, and the final ranked list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A repository returned by search, before enrichment.
///
/// Only the identity is required to build one. Everything else is read
/// leniently from the search item and validated later, during enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable unique id assigned by GitHub. Deduplication key.
    pub id: u64,
    /// Owner login.
    pub owner: String,
    /// Repository name (without owner).
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    pub description: Option<String>,
    /// Primary language as reported by GitHub.
    pub language: Option<String>,
    pub stars: u64,
    /// Open issue count from search metadata (GitHub counts PRs here too).
    pub open_issues: u64,
    /// Raw `updated_at` timestamp, parsed during enrichment.
    pub updated_at: Option<String>,
    /// The search item exactly as returned by the API.
    #[serde(default)]
    pub raw: Value,
}

impl Candidate {
    /// Build a candidate from a raw search item.
    ///
    /// Returns `None` when the item has no numeric `id`.
    pub fn from_search_item(item: Value) -> Option<Self> {
        let id = item.get("id")?.as_u64()?;
        let str_field = |key: &str| item.get(key).and_then(|v| v.as_str()).map(String::from);
        let u64_field = |key: &str| item.get(key).and_then(|v| v.as_u64()).unwrap_or(0);

        let owner = item
            .get("owner")
            .and_then(|o| o.get("login"))
            .and_then(|l| l.as_str())
            .unwrap_or_default()
            .to_string();
        let name = str_field("name").unwrap_or_default();
        let full_name = str_field("full_name").unwrap_or_else(|| format!("{}/{}", owner, name));

        Some(Self {
            id,
            description: str_field("description"),
            language: str_field("language"),
            stars: u64_field("stargazers_count"),
            open_issues: u64_field("open_issues_count"),
            updated_at: str_field("updated_at"),
            owner,
            name,
            full_name,
            raw: item,
        })
    }
}

/// Outcome of one enrichment call for one metric group.
///
/// `Unavailable` means the source call failed, which is different from a
/// metric that was fetched and happens to be zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Metric<T> {
    Available(T),
    Unavailable,
}

impl<T> Metric<T> {
    /// Returns the value if it was fetched.
    pub fn available(&self) -> Option<&T> {
        match self {
            Metric::Available(value) => Some(value),
            Metric::Unavailable => None,
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_available(&self) -> bool {
        matches!(self, Metric::Available(_))
    }
}

/// Coarse activity bucket used by issue and commit metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityLevel::Low => write!(f, "low"),
            ActivityLevel::Medium => write!(f, "medium"),
            ActivityLevel::High => write!(f, "high"),
        }
    }
}

/// Pull request statistics over the most recently updated page of PRs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestMetrics {
    /// PRs currently open.
    pub open: u64,
    /// Mean days from creation to merge, if any merged PR had both timestamps.
    pub avg_merge_days: Option<f64>,
    /// Merged PRs divided by all PRs seen (0 when none were seen).
    pub merge_rate: f64,
    /// PRs seen.
    pub total: u64,
}

/// Issue statistics, with pull requests filtered out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueMetrics {
    /// Open issues, excluding PRs.
    pub open: u64,
    /// Mean days from creation to close over recently closed issues.
    pub avg_close_days: Option<f64>,
    /// `High` when more than 20 recently closed issues, else `Low`.
    pub activity: ActivityLevel,
}

/// Release cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMetrics {
    pub has_releases: bool,
    pub latest_tag: Option<String>,
    pub days_since_latest: Option<i64>,
    pub total: u64,
    pub avg_days_between: Option<f64>,
}

/// Commit activity from the weekly commit statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitActivity {
    pub level: ActivityLevel,
    /// Commits over the last four weeks.
    pub last_month: u64,
    /// Commits over the whole reported year.
    pub last_year: u64,
}

/// Descriptive fields read straight from the search item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryDetails {
    pub url: String,
    pub forks: u64,
    pub watchers: u64,
    /// Repository size in KB.
    pub size: u64,
    pub default_branch: Option<String>,
    pub license: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub archived: bool,
}

/// A candidate plus every metric group that enrichment could gather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRepository {
    pub candidate: Candidate,
    pub details: RepositoryDetails,
    pub updated_at: DateTime<Utc>,
    /// Whole days between `updated_at` and the enrichment time.
    pub days_since_update: i64,
    /// Contributors on the first page only; undercounts past 100.
    pub contributors: Metric<u64>,
    pub pull_requests: Metric<PullRequestMetrics>,
    pub issues: Metric<IssueMetrics>,
    pub releases: Metric<ReleaseMetrics>,
    pub commit_activity: Metric<CommitActivity>,
    /// Composite score, assigned by the scoring engine.
    pub score: Option<f64>,
}

impl EnrichedRepository {
    pub fn full_name(&self) -> &str {
        &self.candidate.full_name
    }

    /// Average PR merge time in days, when known.
    pub fn avg_merge_days(&self) -> Option<f64> {
        self.pull_requests.available().and_then(|pr| pr.avg_merge_days)
    }
}

/// Repositories ordered by descending composite score.
///
/// Only the scoring engine builds one from enriched repositories, so the
/// ordering invariant holds for every instance that came out of a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedList(Vec<EnrichedRepository>);

impl RankedList {
    pub(crate) fn from_sorted(repositories: Vec<EnrichedRepository>) -> Self {
        Self(repositories)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EnrichedRepository> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnrichedRepository> {
        self.0.iter()
    }

    /// The first `n` repositories (fewer if the list is shorter).
    pub fn top(&self, n: usize) -> &[EnrichedRepository] {
        &self.0[..n.min(self.0.len())]
    }

    #[allow(dead_code)] // Used by re-ranking tests
    pub fn into_inner(self) -> Vec<EnrichedRepository> {
        self.0
    }
}
