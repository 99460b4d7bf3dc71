//! Stage 3c: the ranking-service HTTP client and its heuristic fallback.

use crate::config::RankingConfig;
use crate::error::Result;
use crate::models::{Candidate, PostId, UserFeatures};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RankRequest<'a> {
    user_features: &'a UserFeatures,
    candidates: Vec<RankCandidate<'a>>,
}

#[derive(Debug, Serialize)]
struct RankCandidate<'a> {
    post_id: PostId,
    post_features: &'a crate::models::PostFeatures,
}

#[derive(Debug, Deserialize)]
struct RankResponse {
    scores: Vec<RankScore>,
}

#[derive(Debug, Deserialize)]
struct RankScore {
    post_id: PostId,
    score: f64,
}

#[derive(Clone)]
pub struct RankingClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RankingClient {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Score every candidate via the ranking model and attach `rank_score`
    /// in place. Propagates an error to the caller, which applies the
    /// heuristic fallback instead of retrying inline.
    pub async fn rank(&self, user_features: &UserFeatures, candidates: &mut [Candidate]) -> Result<()> {
        let body = RankRequest {
            user_features,
            candidates: candidates
                .iter()
                .map(|c| RankCandidate {
                    post_id: c.post_id,
                    post_features: &c.post_features,
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/rank", self.base_url))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<RankResponse>()
            .await?;

        let scores: HashMap<PostId, f64> =
            response.scores.into_iter().map(|s| (s.post_id, s.score)).collect();

        for candidate in candidates.iter_mut() {
            candidate.rank_score = scores.get(&candidate.post_id).copied();
        }

        Ok(())
    }
}

/// Heuristic fallback used when the ranking service errors or times out:
/// `score = 0.5 * recency + 0.5 * like_count / max(like_count, 1)`, where
/// `recency = exp(-age_hours / 48)`.
pub fn heuristic_rank(candidates: &mut [Candidate]) {
    let now = Utc::now();
    let max_likes = candidates
        .iter()
        .map(|c| c.post_features.like_count)
        .max()
        .unwrap_or(0)
        .max(1);

    for candidate in candidates.iter_mut() {
        let created_at = chrono::DateTime::<Utc>::from_timestamp(
            candidate.post_features.created_at_ts,
            0,
        )
        .unwrap_or(now);
        let age_hours = (now - created_at).num_seconds() as f64 / 3600.0;
        let recency = (-age_hours.max(0.0) / 48.0).exp();
        let score = 0.5 * recency + 0.5 * (candidate.post_features.like_count as f64 / max_likes as f64);
        candidate.rank_score = Some(score);
    }

    candidates.sort_by(|a, b| {
        b.rank_score
            .partial_cmp(&a.rank_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostFeatures, Source};
    use uuid::Uuid;

    fn candidate(like_count: u64, age_hours: f64) -> Candidate {
        let mut c = Candidate::new(PostId::new(Uuid::new_v4()), Source::Social);
        c.post_features = PostFeatures {
            like_count,
            created_at_ts: (Utc::now().timestamp() as f64 - age_hours * 3600.0) as i64,
            ..Default::default()
        };
        c
    }

    #[test]
    fn newer_posts_rank_higher_at_equal_likes() {
        let old_post = candidate(10, 48.0);
        let new_post = candidate(10, 1.0);
        let new_post_id = new_post.post_id;
        let mut candidates = vec![old_post, new_post];
        heuristic_rank(&mut candidates);
        assert_eq!(candidates[0].post_id, new_post_id);
        assert!(candidates[0].rank_score.unwrap() > candidates[1].rank_score.unwrap());
    }

    #[test]
    fn more_liked_posts_rank_higher_at_equal_age() {
        let mut candidates = vec![candidate(1, 5.0), candidate(100, 5.0)];
        heuristic_rank(&mut candidates);
        assert_eq!(candidates[0].post_features.like_count, 100);
    }

    #[test]
    fn empty_candidate_list_is_a_no_op() {
        let mut candidates: Vec<Candidate> = vec![];
        heuristic_rank(&mut candidates);
        assert!(candidates.is_empty());
    }

    #[test]
    fn score_matches_documented_formula() {
        let mut candidates = vec![candidate(50, 24.0)];
        heuristic_rank(&mut candidates);
        let expected_recency = (-24.0f64 / 48.0).exp();
        let expected = 0.5 * expected_recency + 0.5 * (50.0 / 50.0);
        assert!((candidates[0].rank_score.unwrap() - expected).abs() < 1e-9);
    }
}
