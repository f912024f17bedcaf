//! Composite scoring and ranking.
//!
//! The score is a sum of five independently capped buckets, so no single
//! raw metric can dominate and unknown metrics simply contribute nothing.

use crate::models::{EnrichedRepository, RankedList};

pub const MAX_STAR_POINTS: f64 = 1000.0;
pub const MAX_CONTRIBUTOR_POINTS: f64 = 500.0;
pub const MAX_RECENCY_POINTS: f64 = 300.0;
pub const MAX_MERGE_SPEED_POINTS: f64 = 200.0;
pub const MAX_ISSUE_HEALTH_POINTS: f64 = 100.0;

/// Upper bound of [`composite_score`].
pub const MAX_SCORE: f64 = MAX_STAR_POINTS
    + MAX_CONTRIBUTOR_POINTS
    + MAX_RECENCY_POINTS
    + MAX_MERGE_SPEED_POINTS
    + MAX_ISSUE_HEALTH_POINTS;

/// One point per ten stars.
pub fn star_points(stars: u64) -> f64 {
    (stars as f64 / 10.0).min(MAX_STAR_POINTS)
}

/// Five points per contributor.
pub fn contributor_points(contributors: Option<u64>) -> f64 {
    contributors
        .map(|c| (c as f64 * 5.0).min(MAX_CONTRIBUTOR_POINTS))
        .unwrap_or(0.0)
}

pub fn recency_points(days_since_update: i64) -> f64 {
    match days_since_update {
        d if d <= 7 => 300.0,
        d if d <= 30 => 200.0,
        d if d <= 90 => 100.0,
        _ => 0.0,
    }
}

pub fn merge_speed_points(avg_merge_days: Option<f64>) -> f64 {
    match avg_merge_days {
        Some(d) if d <= 1.0 => 200.0,
        Some(d) if d <= 3.0 => 150.0,
        Some(d) if d <= 7.0 => 100.0,
        Some(d) if d <= 14.0 => 50.0,
        _ => 0.0,
    }
}

/// Rewards a low open-issue to star ratio. Zero-star repositories get nothing.
pub fn issue_health_points(open_issues: u64, stars: u64) -> f64 {
    if stars == 0 {
        return 0.0;
    }
    let ratio = open_issues as f64 / stars as f64;
    if ratio < 0.1 {
        100.0
    } else if ratio < 0.2 {
        50.0
    } else {
        0.0
    }
}

/// Composite score of an enriched repository.
pub fn composite_score(repo: &EnrichedRepository) -> f64 {
    let stars = repo.candidate.stars;

    star_points(stars)
        + contributor_points(repo.contributors.available().copied())
        + recency_points(repo.days_since_update)
        + merge_speed_points(repo.avg_merge_days())
        + issue_health_points(repo.candidate.open_issues, stars)
}

/// Score every repository and sort by descending score.
///
/// The sort is stable, so equal scores keep their input order.
pub fn rank(mut repositories: Vec<EnrichedRepository>) -> RankedList {
    for repo in &mut repositories {
        repo.score = Some(composite_score(repo));
    }

    repositories.sort_by(|a, b| {
        let a = a.score.unwrap_or(0.0);
        let b = b.score.unwrap_or(0.0);
        b.total_cmp(&a)
    });

    RankedList::from_sorted(repositories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Candidate, EnrichedRepository, Metric, PullRequestMetrics, RepositoryDetails,
    };
    use chrono::Utc;
    use serde_json::json;

    fn repo(id: u64, stars: u64, open_issues: u64, days: i64, contributors: u64) -> EnrichedRepository {
        let candidate = Candidate::from_search_item(json!({
            "id": id,
            "name": format!("repo{}", id),
            "owner": {"login": "acme"},
            "stargazers_count": stars,
            "open_issues_count": open_issues,
        }))
        .unwrap();

        EnrichedRepository {
            candidate,
            details: RepositoryDetails {
                url: String::new(),
                forks: 0,
                watchers: 0,
                size: 0,
                default_branch: None,
                license: None,
                topics: Vec::new(),
                archived: false,
            },
            updated_at: Utc::now(),
            days_since_update: days,
            contributors: Metric::Available(contributors),
            pull_requests: Metric::Unavailable,
            issues: Metric::Unavailable,
            releases: Metric::Unavailable,
            commit_activity: Metric::Unavailable,
            score: None,
        }
    }

    fn with_merge_days(mut repo: EnrichedRepository, days: f64) -> EnrichedRepository {
        repo.pull_requests = Metric::Available(PullRequestMetrics {
            open: 0,
            avg_merge_days: Some(days),
            merge_rate: 1.0,
            total: 1,
        });
        repo
    }

    #[test]
    fn test_two_repository_scenario() {
        let first = repo(1, 100, 30, 3, 10);
        let second = repo(2, 50, 20, 200, 50);

        assert_eq!(composite_score(&first), 360.0);
        assert_eq!(composite_score(&second), 255.0);

        let ranked = rank(vec![second, first]);
        let ids: Vec<u64> = ranked.iter().map(|r| r.candidate.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(ranked.get(0).and_then(|r| r.score), Some(360.0));
    }

    #[test]
    fn test_bucket_thresholds() {
        assert_eq!(recency_points(7), 300.0);
        assert_eq!(recency_points(8), 200.0);
        assert_eq!(recency_points(30), 200.0);
        assert_eq!(recency_points(90), 100.0);
        assert_eq!(recency_points(91), 0.0);

        assert_eq!(merge_speed_points(Some(1.0)), 200.0);
        assert_eq!(merge_speed_points(Some(2.5)), 150.0);
        assert_eq!(merge_speed_points(Some(7.0)), 100.0);
        assert_eq!(merge_speed_points(Some(14.0)), 50.0);
        assert_eq!(merge_speed_points(Some(14.1)), 0.0);
        assert_eq!(merge_speed_points(None), 0.0);

        assert_eq!(issue_health_points(9, 100), 100.0);
        assert_eq!(issue_health_points(10, 100), 50.0);
        assert_eq!(issue_health_points(20, 100), 0.0);
        assert_eq!(issue_health_points(0, 0), 0.0);
    }

    #[test]
    fn test_unknown_contributors_score_zero() {
        let mut r = repo(1, 0, 0, 1000, 0);
        r.contributors = Metric::Unavailable;
        assert_eq!(composite_score(&r), 0.0);
    }

    #[test]
    fn test_score_is_bounded() {
        let huge = with_merge_days(repo(1, 50_000_000, 0, 0, 100_000), 0.1);
        assert_eq!(composite_score(&huge), MAX_SCORE);
        assert_eq!(MAX_SCORE, 2100.0);
    }

    #[test]
    fn test_score_monotonic_in_stars() {
        let mut previous = f64::MIN;
        for stars in [0, 1, 9, 10, 99, 100, 1_000, 9_999, 10_000, 50_000, 1_000_000] {
            let score = composite_score(&repo(1, stars, 5, 10, 3));
            assert!(score >= previous, "score dropped at {} stars", stars);
            previous = score;
        }
    }

    #[test]
    fn test_score_monotonic_in_recency_gap() {
        let mut previous = f64::MAX;
        for days in [0, 7, 8, 30, 31, 90, 91, 365, 5_000] {
            let score = composite_score(&repo(1, 500, 10, days, 3));
            assert!(score <= previous, "score rose at {} days", days);
            previous = score;
        }
    }

    #[test]
    fn test_ties_keep_input_order_and_rerank_is_idempotent() {
        let ranked = rank(vec![
            repo(1, 100, 50, 400, 1),
            repo(2, 5_000, 0, 1, 20),
            repo(3, 100, 50, 400, 1),
            repo(4, 100, 50, 400, 1),
        ]);
        let ids: Vec<u64> = ranked.iter().map(|r| r.candidate.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);

        let reranked = rank(ranked.clone().into_inner());
        assert_eq!(reranked, ranked);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(Vec::new()).is_empty());
    }
}
