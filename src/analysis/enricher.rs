//! Concurrent enrichment of search candidates.
//!
//! Candidates are processed in fixed-size batches. Within a batch every
//! candidate runs as its own task and fires its five sub-fetches at once;
//! the batch is drained completely before the inter-batch pause, which
//! keeps the number of outstanding GitHub calls bounded.

use crate::github::{
    IssueItem, ItemState, MetricsSource, PullRequest, Release, SourceError, WeeklyCommits,
};
use crate::models::{
    ActivityLevel, Candidate, CommitActivity, EnrichedRepository, IssueMetrics, Metric,
    PullRequestMetrics, ReleaseMetrics, RepositoryDetails,
};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Merged PRs considered for the average merge time.
const MERGE_SAMPLE: usize = 50;
/// Closed issues requested for the close-time average.
const CLOSED_ISSUE_PAGE: u32 = 50;
const OPEN_ISSUE_PAGE: u32 = 100;
/// More recently closed issues than this means high issue activity.
const HIGH_ISSUE_ACTIVITY: usize = 20;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Batch pacing for enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentSettings {
    /// Candidates enriched concurrently.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(500),
        }
    }
}

/// Why a candidate could not be enriched at all.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("repository {repo} is missing required field `{field}`")]
    MissingField { repo: String, field: &'static str },

    #[error("repository {repo} has unparseable updated_at {value:?}: {source}")]
    BadTimestamp {
        repo: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Fields every enriched repository must have, read from the candidate.
struct BaseFields {
    updated_at: DateTime<Utc>,
    days_since_update: i64,
    details: RepositoryDetails,
}

impl BaseFields {
    fn extract(candidate: &Candidate, now: DateTime<Utc>) -> Result<Self, EnrichError> {
        let repo = candidate.full_name.clone();

        if candidate.owner.is_empty() {
            return Err(EnrichError::MissingField { repo, field: "owner" });
        }
        if candidate.name.is_empty() {
            return Err(EnrichError::MissingField { repo, field: "name" });
        }

        let raw_updated = candidate
            .updated_at
            .as_deref()
            .ok_or_else(|| EnrichError::MissingField {
                repo: repo.clone(),
                field: "updated_at",
            })?;
        let updated_at = DateTime::parse_from_rfc3339(raw_updated)
            .map_err(|source| EnrichError::BadTimestamp {
                repo: repo.clone(),
                value: raw_updated.to_string(),
                source,
            })?
            .with_timezone(&Utc);

        let raw = &candidate.raw;
        let str_field = |key: &str| raw.get(key).and_then(|v| v.as_str()).map(String::from);
        let u64_field = |key: &str| raw.get(key).and_then(|v| v.as_u64()).unwrap_or(0);

        let details = RepositoryDetails {
            url: str_field("html_url")
                .unwrap_or_else(|| format!("https://github.com/{}", candidate.full_name)),
            forks: u64_field("forks_count"),
            watchers: u64_field("watchers_count"),
            size: u64_field("size"),
            default_branch: str_field("default_branch"),
            license: raw
                .get("license")
                .and_then(|l| l.get("name"))
                .and_then(|n| n.as_str())
                .map(String::from),
            topics: raw
                .get("topics")
                .and_then(|t| t.as_array())
                .map(|topics| {
                    topics
                        .iter()
                        .filter_map(|t| t.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
            archived: raw.get("archived").and_then(|a| a.as_bool()).unwrap_or(false),
        };

        Ok(Self {
            updated_at,
            days_since_update: (now - updated_at).num_days(),
            details,
        })
    }
}

fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / SECONDS_PER_DAY
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Summarize one page of pull requests.
pub fn summarize_pull_requests(prs: &[PullRequest]) -> PullRequestMetrics {
    if prs.is_empty() {
        return PullRequestMetrics {
            open: 0,
            avg_merge_days: None,
            merge_rate: 0.0,
            total: 0,
        };
    }

    let open = prs.iter().filter(|pr| pr.state == "open").count();
    let merged: Vec<&PullRequest> = prs.iter().filter(|pr| pr.merged_at.is_some()).collect();

    let sample_start = merged.len().saturating_sub(MERGE_SAMPLE);
    let merge_times: Vec<f64> = merged[sample_start..]
        .iter()
        .filter_map(|pr| match (pr.created_at, pr.merged_at) {
            (Some(created), Some(merged)) => Some(days_between(created, merged)),
            _ => None,
        })
        .collect();

    PullRequestMetrics {
        open: open as u64,
        avg_merge_days: mean(&merge_times),
        merge_rate: merged.len() as f64 / prs.len() as f64,
        total: prs.len() as u64,
    }
}

/// Summarize open and recently closed issues, ignoring pull requests.
pub fn summarize_issues(open: &[IssueItem], closed: &[IssueItem]) -> IssueMetrics {
    let open_count = open.iter().filter(|i| !i.is_pull_request()).count();
    let closed: Vec<&IssueItem> = closed.iter().filter(|i| !i.is_pull_request()).collect();

    let close_times: Vec<f64> = closed
        .iter()
        .filter_map(|issue| match (issue.created_at, issue.closed_at) {
            (Some(created), Some(closed)) => Some(days_between(created, closed)),
            _ => None,
        })
        .collect();

    IssueMetrics {
        open: open_count as u64,
        avg_close_days: mean(&close_times),
        activity: if closed.len() > HIGH_ISSUE_ACTIVITY {
            ActivityLevel::High
        } else {
            ActivityLevel::Low
        },
    }
}

/// Summarize releases, newest first.
pub fn summarize_releases(releases: &[Release], now: DateTime<Utc>) -> ReleaseMetrics {
    let Some(latest) = releases.first() else {
        return ReleaseMetrics {
            has_releases: false,
            latest_tag: None,
            days_since_latest: None,
            total: 0,
            avg_days_between: None,
        };
    };

    let avg_days_between = match (releases.len(), latest.published_at, releases.last()) {
        (n, Some(newest), Some(oldest)) if n > 1 => oldest
            .published_at
            .map(|oldest| (newest - oldest).num_days() as f64 / (n - 1) as f64),
        _ => None,
    };

    ReleaseMetrics {
        has_releases: true,
        latest_tag: Some(latest.tag_name.clone()),
        days_since_latest: latest.published_at.map(|p| (now - p).num_days()),
        total: releases.len() as u64,
        avg_days_between,
    }
}

/// Summarize weekly commit totals, oldest week first.
pub fn summarize_commit_activity(weeks: &[WeeklyCommits]) -> CommitActivity {
    let recent_start = weeks.len().saturating_sub(4);
    let last_month: u64 = weeks[recent_start..].iter().map(|w| w.total).sum();
    let last_year: u64 = weeks.iter().map(|w| w.total).sum();

    let level = if last_month > 50 {
        ActivityLevel::High
    } else if last_month > 10 {
        ActivityLevel::Medium
    } else {
        ActivityLevel::Low
    };

    CommitActivity {
        level,
        last_month,
        last_year,
    }
}

async fn contributor_count(
    source: &dyn MetricsSource,
    owner: &str,
    name: &str,
) -> Result<u64, SourceError> {
    Ok(source.contributors(owner, name).await?.len() as u64)
}

async fn pull_request_metrics(
    source: &dyn MetricsSource,
    owner: &str,
    name: &str,
) -> Result<PullRequestMetrics, SourceError> {
    let prs = source.pull_requests(owner, name, ItemState::All).await?;
    Ok(summarize_pull_requests(&prs))
}

async fn issue_metrics(
    source: &dyn MetricsSource,
    owner: &str,
    name: &str,
) -> Result<IssueMetrics, SourceError> {
    let (open, closed) = tokio::try_join!(
        source.issues(owner, name, ItemState::Open, OPEN_ISSUE_PAGE),
        source.issues(owner, name, ItemState::Closed, CLOSED_ISSUE_PAGE),
    )?;
    Ok(summarize_issues(&open, &closed))
}

async fn release_metrics(
    source: &dyn MetricsSource,
    owner: &str,
    name: &str,
    now: DateTime<Utc>,
) -> Result<ReleaseMetrics, SourceError> {
    let releases = source.releases(owner, name).await?;
    Ok(summarize_releases(&releases, now))
}

async fn commit_activity(
    source: &dyn MetricsSource,
    owner: &str,
    name: &str,
) -> Result<CommitActivity, SourceError> {
    let weeks = source.commit_activity(owner, name).await?;
    Ok(summarize_commit_activity(&weeks))
}

/// Collapse a sub-fetch result into a metric group, logging the failure.
fn recover<T>(result: Result<T, SourceError>, group: &str, repo: &str) -> Metric<T> {
    match result {
        Ok(value) => Metric::Available(value),
        Err(e) => {
            warn!("{} unavailable for {}: {}", group, repo, e);
            Metric::Unavailable
        }
    }
}

/// Enrich a single candidate. Fails only when its base fields are unusable.
pub async fn enrich_candidate(
    source: &dyn MetricsSource,
    candidate: Candidate,
    now: DateTime<Utc>,
) -> Result<EnrichedRepository, EnrichError> {
    let base = BaseFields::extract(&candidate, now)?;
    let (owner, name) = (candidate.owner.as_str(), candidate.name.as_str());

    let (contributors, pull_requests, issues, releases, activity) = tokio::join!(
        contributor_count(source, owner, name),
        pull_request_metrics(source, owner, name),
        issue_metrics(source, owner, name),
        release_metrics(source, owner, name, now),
        commit_activity(source, owner, name),
    );

    let repo = candidate.full_name.as_str();
    let contributors = recover(contributors, "contributors", repo);
    let pull_requests = recover(pull_requests, "pull request metrics", repo);
    let issues = recover(issues, "issue metrics", repo);
    let releases = recover(releases, "release info", repo);
    let commit_activity = recover(activity, "commit activity", repo);

    Ok(EnrichedRepository {
        details: base.details,
        updated_at: base.updated_at,
        days_since_update: base.days_since_update,
        contributors,
        pull_requests,
        issues,
        releases,
        commit_activity,
        score: None,
        candidate,
    })
}

/// Batch-paced enricher.
pub struct Enricher {
    source: Arc<dyn MetricsSource>,
    settings: EnrichmentSettings,
    progress: ProgressBar,
}

impl Enricher {
    pub fn new(source: Arc<dyn MetricsSource>, settings: EnrichmentSettings) -> Self {
        Self {
            source,
            settings,
            progress: ProgressBar::hidden(),
        }
    }

    /// Show a progress bar while enriching.
    pub fn with_progress(mut self, show: bool) -> Self {
        if show {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} repositories")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            self.progress = pb;
        }
        self
    }

    pub async fn enrich(&self, candidates: &[Candidate]) -> Vec<EnrichedRepository> {
        self.enrich_at(candidates, Utc::now()).await
    }

    /// Enrich with an explicit reference time for day-based metrics.
    pub async fn enrich_at(
        &self,
        candidates: &[Candidate],
        now: DateTime<Utc>,
    ) -> Vec<EnrichedRepository> {
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = candidates.len().div_ceil(batch_size);
        let mut enriched = Vec::with_capacity(candidates.len());

        self.progress.reset();
        self.progress.set_length(candidates.len() as u64);

        for (batch_index, batch) in candidates.chunks(batch_size).enumerate() {
            if batch_index > 0 && !self.settings.batch_delay.is_zero() {
                debug!("Pausing {:?} before next batch", self.settings.batch_delay);
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            debug!(
                "Enriching batch {}/{} ({} repositories)",
                batch_index + 1,
                total_batches,
                batch.len()
            );

            let mut tasks = JoinSet::new();
            for (slot, candidate) in batch.iter().cloned().enumerate() {
                let source = Arc::clone(&self.source);
                tasks.spawn(async move {
                    let result = enrich_candidate(source.as_ref(), candidate, now).await;
                    (slot, result)
                });
            }

            let mut slots: Vec<Option<EnrichedRepository>> = (0..batch.len()).map(|_| None).collect();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((slot, Ok(repo))) => slots[slot] = Some(repo),
                    Ok((_, Err(e))) => warn!("Dropping candidate: {}", e),
                    Err(e) => warn!("Enrichment task failed: {}", e),
                }
                self.progress.inc(1);
            }

            enriched.extend(slots.into_iter().flatten());
        }

        self.progress.finish_and_clear();
        info!(
            "Enriched {} of {} candidates in {} batch(es)",
            enriched.len(),
            candidates.len(),
            total_batches
        );

        enriched
    }
}
