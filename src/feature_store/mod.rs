//! Stage 3 feature hydration: the primary feature-store HTTP client (3a)
//! plus the local Redis-backed fallback cache (3b) used when the primary
//! path errors out.

pub mod local_cache;

use crate::config::FeatureStoreConfig;
use crate::error::Result;
use crate::models::{FeatureBundle, PostFeatures, PostId, UserFeatures, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Serialize)]
struct OnlineFeaturesRequest {
    feature_service: &'static str,
    entities: Entities,
}

#[derive(Debug, Serialize)]
struct AffinityRequest {
    features: Vec<&'static str>,
    entities: AffinityEntities,
}

#[derive(Debug, Serialize)]
struct Entities {
    user_id: Vec<String>,
    post_id: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AffinityEntities {
    user_id: Vec<String>,
    author_id: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureResponse {
    metadata: FeatureMetadata,
    results: Vec<FeatureRow>,
}

#[derive(Debug, Deserialize)]
struct FeatureMetadata {
    feature_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureRow {
    values: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct FeatureStoreClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    affinity_timeout: Duration,
}

impl FeatureStoreClient {
    pub fn new(config: &FeatureStoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            affinity_timeout: Duration::from_millis(config.affinity_timeout_ms),
        }
    }

    /// Fetch the `ranking_features` bundle for `viewer` against every post
    /// in `post_ids`, pivoting the column-oriented response into a typed
    /// [`FeatureBundle`]. `topic_similarity` is left at its default (0.0)
    /// here; the caller fills it in once the viewer's interest vector is
    /// available, since that computation is purely local.
    pub async fn get_online_features(
        &self,
        viewer: UserId,
        post_ids: &[PostId],
    ) -> Result<FeatureBundle> {
        let n = post_ids.len();
        let body = OnlineFeaturesRequest {
            feature_service: "ranking_features",
            entities: Entities {
                user_id: vec![viewer.to_string(); n],
                post_id: post_ids.iter().map(|p| p.to_string()).collect(),
            },
        };

        let response = self
            .client
            .post(format!("{}/get-online-features", self.base_url))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<FeatureResponse>()
            .await?;

        Ok(pivot(response, post_ids))
    }

    /// Second call: fetch `user_author_affinity:affinity_score` for each
    /// unique author among `candidates_authors`, on its own timeout budget
    /// independent of the primary call. Returns `author_id -> score`;
    /// authors absent from the response are left out and treated as 0.0
    /// by the caller.
    pub async fn get_affinity_scores(
        &self,
        viewer: UserId,
        authors: &[UserId],
    ) -> Result<HashMap<UserId, f64>> {
        if authors.is_empty() {
            return Ok(HashMap::new());
        }

        let unique: Vec<UserId> = authors
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let body = AffinityRequest {
            features: vec!["user_author_affinity:affinity_score"],
            entities: AffinityEntities {
                user_id: vec![viewer.to_string(); unique.len()],
                author_id: unique.iter().map(|a| a.to_string()).collect(),
            },
        };

        let response = self
            .client
            .post(format!("{}/get-online-features", self.base_url))
            .json(&body)
            .timeout(self.affinity_timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<FeatureResponse>()
            .await?;

        let score_idx = response
            .metadata
            .feature_names
            .iter()
            .position(|name| name == "user_author_affinity:affinity_score");

        let Some(idx) = score_idx else {
            return Ok(HashMap::new());
        };

        // Column-oriented, same as `get_online_features`: `results[idx].values[j]`
        // where `j` indexes the entity (author) row, not the feature row.
        let Some(column) = response.results.get(idx) else {
            return Ok(HashMap::new());
        };

        let mut scores = HashMap::new();
        for (author, value) in unique.iter().zip(column.values.iter()) {
            if let Some(value) = value.as_f64() {
                scores.insert(*author, value);
            }
        }

        Ok(scores)
    }
}

/// Pivot the struct-of-arrays feature-store response into per-post
/// [`PostFeatures`] and a broadcast [`UserFeatures`]. Columns prefixed
/// `user_stats__` are user-level and identical across rows; columns
/// prefixed `post_stats__` are per-post.
fn pivot(response: FeatureResponse, post_ids: &[PostId]) -> FeatureBundle {
    let mut user_features = UserFeatures::default();
    let mut post_features: HashMap<PostId, PostFeatures> = post_ids
        .iter()
        .map(|id| (*id, PostFeatures::default()))
        .collect();

    for (col_idx, name) in response.metadata.feature_names.iter().enumerate() {
        if let Some(field) = name.strip_prefix("user_stats__") {
            if let Some(row) = response.results.get(col_idx) {
                apply_user_field(&mut user_features, field, row.values.first());
            }
        } else if let Some(field) = name.strip_prefix("post_stats__") {
            if let Some(row) = response.results.get(col_idx) {
                for (post_id, value) in post_ids.iter().zip(row.values.iter()) {
                    if let Some(features) = post_features.get_mut(post_id) {
                        apply_post_field(features, field, Some(value));
                    }
                }
            }
        }
    }

    FeatureBundle {
        user_features,
        post_features,
    }
}

fn apply_user_field(user: &mut UserFeatures, field: &str, value: Option<&serde_json::Value>) {
    let Some(value) = value else { return };
    match field {
        "follower_count" => user.follower_count = value.as_u64().unwrap_or_default(),
        "following_count" => user.following_count = value.as_u64().unwrap_or_default(),
        "total_posts" => user.total_posts = value.as_u64().unwrap_or_default(),
        "avg_engagement_rate" => user.avg_engagement_rate = value.as_f64().unwrap_or_default(),
        "interest_vector_json" => {
            if let Some(s) = value.as_str() {
                if let Ok(vector) = serde_json::from_str(s) {
                    user.interest_vector = vector;
                }
            }
        }
        other => {
            if let Some(n) = value.as_f64() {
                user.extras.insert(other.to_string(), n);
            }
        }
    }
}

fn apply_post_field(post: &mut PostFeatures, field: &str, value: Option<&serde_json::Value>) {
    let Some(value) = value else { return };
    match field {
        "author_id" => {
            if let Some(s) = value.as_str() {
                post.author_id = s.parse().ok();
            }
        }
        "like_count" => post.like_count = value.as_u64().unwrap_or_default(),
        "created_at_ts" => post.created_at_ts = value.as_i64().unwrap_or_default(),
        "has_media" => post.has_media = value.as_bool().unwrap_or_default(),
        "content_length" => post.content_length = value.as_u64().unwrap_or_default() as u32,
        "author_follower_count" => {
            post.author_follower_count = value.as_u64().unwrap_or_default()
        }
        "embedding_json" => {
            if let Some(s) = value.as_str() {
                if let Ok(embedding) = serde_json::from_str(s) {
                    post.embedding = embedding;
                } else {
                    warn!("failed to parse embedding_json for a post feature row");
                }
            }
        }
        other => {
            if let Some(n) = value.as_f64() {
                post.extras.insert(other.to_string(), n);
            }
        }
    }
}

/// cosine(interest_vector, embedding) clipped to `[0, 1]` via `(x+1)/2`.
/// Returns 0.5 (cosine of 0, clipped) when either vector is empty or they
/// differ in length, since that indicates a missing embedding rather than
/// a true orthogonal relationship.
pub fn topic_similarity(interest_vector: &[f32], embedding: &[f32]) -> f64 {
    if interest_vector.is_empty() || embedding.is_empty() || interest_vector.len() != embedding.len() {
        return 0.5;
    }

    let dot: f32 = interest_vector
        .iter()
        .zip(embedding.iter())
        .map(|(a, b)| a * b)
        .sum();
    let norm_a: f32 = interest_vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.5;
    }

    let cosine = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f64;
    (cosine + 1.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 0.0, 0.0];
        assert!((topic_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn topic_similarity_of_opposite_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((topic_similarity(&a, &b) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn topic_similarity_clipped_into_unit_interval() {
        let a = vec![1.0, 2.0, -3.0];
        let b = vec![-1.0, 0.5, 2.0];
        let sim = topic_similarity(&a, &b);
        assert!((0.0..=1.0).contains(&sim));
    }

    #[test]
    fn topic_similarity_defaults_on_empty_vectors() {
        assert_eq!(topic_similarity(&[], &[1.0]), 0.5);
    }
}
