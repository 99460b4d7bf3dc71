//! Local feature cache (3b): a Redis-backed hot cache used when the
//! primary feature-store call errors out. Same storage technology as the
//! mailbox, a distinct keyspace (`localfeat:`), matching the reference
//! feature-store's online-serving cache.

use crate::error::{AppError, Result};
use crate::models::{PostFeatures, PostId, UserFeatures, UserId};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

fn user_key(user_id: UserId) -> String {
    format!("localfeat:user:{}", user_id)
}

fn post_key(post_id: PostId) -> String {
    format!("localfeat:post:{}", post_id)
}

#[derive(Clone)]
pub struct LocalFeatureCache {
    conn: Arc<ConnectionManager>,
}

impl LocalFeatureCache {
    pub fn new(conn: Arc<ConnectionManager>) -> Self {
        Self { conn }
    }

    /// Fetch broadcast user features. Returns the default (all-zero)
    /// bundle on a cache miss rather than an error.
    pub async fn get_user_features(&self, user_id: UserId) -> Result<UserFeatures> {
        let key = user_key(user_id);
        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut self.conn.as_ref().clone())
            .await
            .map_err(AppError::from)?;

        match value {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                AppError::Internal(format!("local feature cache deserialization failed: {}", e))
            }),
            None => Ok(UserFeatures::default()),
        }
    }

    pub async fn set_user_features(&self, user_id: UserId, features: &UserFeatures) -> Result<()> {
        let key = user_key(user_id);
        let json = serde_json::to_string(features)
            .map_err(|e| AppError::Internal(format!("serialization failed: {}", e)))?;
        redis::cmd("SETEX")
            .arg(&key)
            .arg(7 * 24 * 60 * 60u64)
            .arg(&json)
            .query_async::<_, ()>(&mut self.conn.as_ref().clone())
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    /// Batch-fetch per-post features, keyed by PostId. Posts with no
    /// cached entry are returned with default (empty) features rather
    /// than omitted, so every requested candidate still gets a row.
    pub async fn batch_get_post_features(
        &self,
        post_ids: &[PostId],
    ) -> Result<HashMap<PostId, PostFeatures>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = post_ids.iter().map(|id| post_key(*id)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut self.conn.as_ref().clone())
            .await
            .map_err(AppError::from)?;

        let mut result = HashMap::with_capacity(post_ids.len());
        for (post_id, value) in post_ids.iter().zip(values.into_iter()) {
            let features = match value {
                Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                    warn!(post_id = %post_id, error = %e, "local feature cache entry corrupt, using default");
                    PostFeatures::default()
                }),
                None => PostFeatures::default(),
            };
            result.insert(*post_id, features);
        }

        Ok(result)
    }

    pub async fn set_post_features(&self, post_id: PostId, features: &PostFeatures) -> Result<()> {
        let key = post_key(post_id);
        let json = serde_json::to_string(features)
            .map_err(|e| AppError::Internal(format!("serialization failed: {}", e)))?;
        redis::cmd("SETEX")
            .arg(&key)
            .arg(7 * 24 * 60 * 60u64)
            .arg(&json)
            .query_async::<_, ()>(&mut self.conn.as_ref().clone())
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn user_key_format() {
        let user_id = UserId::new(Uuid::nil());
        assert_eq!(user_key(user_id), format!("localfeat:user:{}", Uuid::nil()));
    }

    #[test]
    fn post_key_format() {
        let post_id = PostId::new(Uuid::nil());
        assert_eq!(post_key(post_id), format!("localfeat:post:{}", Uuid::nil()));
    }
}
