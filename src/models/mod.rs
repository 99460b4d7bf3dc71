//! Core data types shared across the feed pipeline and the fan-out worker.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque post identifier. Serializes/deserializes transparently as the
/// underlying UUID's string form, matching every wire contract in this
/// service (feature store, ranking service, impression store all pass ids
/// as JSON strings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub Uuid);

/// Opaque user identifier. An author is simply a `UserId` used in the
/// author position; there is no separate `AuthorId` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

macro_rules! impl_id_boilerplate {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $ty {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

impl_id_boilerplate!(PostId);
impl_id_boilerplate!(UserId);

/// Where a candidate was first observed during the C3 merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Social,
    Discovery,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Social => write!(f, "social"),
            Source::Discovery => write!(f, "discovery"),
        }
    }
}

/// A candidate post moving through stages 1-4 of the ranking pipeline.
///
/// `source` is fixed at merge time (C3) and never changes afterwards even
/// though the post may later be discarded by the impression filter or the
/// diversity cap.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub post_id: PostId,
    pub source: Source,
    pub post_features: PostFeatures,
    pub rank_score: Option<f64>,
}

impl Candidate {
    pub fn new(post_id: PostId, source: Source) -> Self {
        Self {
            post_id,
            source,
            post_features: PostFeatures::default(),
            rank_score: None,
        }
    }
}

/// Typed post-side features. `extras` carries any additional signal the
/// feature store returns that isn't otherwise modeled here - model-only
/// signals this crate doesn't interpret but still forwards to the ranking
/// service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFeatures {
    pub author_id: Option<UserId>,
    pub like_count: u64,
    pub created_at_ts: i64,
    pub has_media: bool,
    pub content_length: u32,
    pub author_follower_count: u64,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub affinity_score: f64,
    pub topic_similarity: f64,
    #[serde(default)]
    pub extras: HashMap<String, f64>,
}

/// Typed user-side features, broadcast to every candidate in a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFeatures {
    pub follower_count: u64,
    pub following_count: u64,
    pub total_posts: u64,
    pub avg_engagement_rate: f64,
    #[serde(default)]
    pub interest_vector: Vec<f32>,
    #[serde(default)]
    pub extras: HashMap<String, f64>,
}

/// Request-scoped bundle produced by stage 3 feature hydration. Never
/// persisted.
#[derive(Debug, Clone, Default)]
pub struct FeatureBundle {
    pub user_features: UserFeatures,
    pub post_features: HashMap<PostId, PostFeatures>,
}

/// Relational record for a post, as hydrated in stage 4.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_username: Option<String>,
    pub author_display_name: Option<String>,
    pub content: Option<String>,
    pub media_key: Option<String>,
    pub media_type: Option<String>,
    pub like_count: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A single item in the feed response.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPost {
    pub post_id: PostId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub like_count: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub rank_score: f64,
    pub source: Source,
}

/// Response body for `GET /feed`.
#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub user_id: UserId,
    pub posts: Vec<FeedPost>,
    pub candidates_social: usize,
    pub candidates_discovery: usize,
    pub candidates_after_filter: usize,
    pub latency_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_id_roundtrips_through_string() {
        let id = Uuid::new_v4();
        let post_id = PostId::new(id);
        let parsed: PostId = post_id.to_string().parse().unwrap();
        assert_eq!(post_id, parsed);
    }

    #[test]
    fn post_id_serializes_as_plain_string() {
        let id = Uuid::new_v4();
        let post_id = PostId::new(id);
        let json = serde_json::to_string(&post_id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn source_display_matches_wire_values() {
        assert_eq!(Source::Social.to_string(), "social");
        assert_eq!(Source::Discovery.to_string(), "discovery");
    }
}
