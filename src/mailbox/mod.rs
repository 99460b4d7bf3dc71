//! Redis-backed mailbox store (C1).
//!
//! Each user's mailbox is a Redis sorted set at `mailbox:{user_id}`, scored
//! by post creation timestamp (seconds since epoch, as an `f64`). Pushing a
//! post is a single pipelined `ZADD` + `ZREMRANGEBYRANK` + `EXPIRE` so the
//! size cap and TTL refresh happen atomically from the client's perspective
//! even though Redis itself executes them as three separate commands inside
//! one round trip.
//!
//! A per-user interest vector used for cold-start discovery candidates lives
//! alongside the mailbox at `interest:{user_id}` as a JSON-encoded `Vec<f32>`.

use crate::error::{AppError, Result};
use crate::models::{PostId, UserId};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::warn;

fn mailbox_key(user_id: UserId) -> String {
    format!("mailbox:{}", user_id)
}

fn interest_key(user_id: UserId) -> String {
    format!("interest:{}", user_id)
}

#[async_trait]
pub trait MailboxStore: Send + Sync {
    /// Push a post into `user_id`'s mailbox, trimming to `max_size` entries
    /// (highest score kept) and refreshing the key's TTL to `ttl_secs`.
    async fn push(
        &self,
        user_id: UserId,
        post_id: PostId,
        created_at_ts: f64,
        max_size: usize,
        ttl_secs: u64,
    ) -> Result<()>;

    /// Return up to `limit` post ids, most recent first.
    async fn top(&self, user_id: UserId, limit: usize) -> Result<Vec<PostId>>;

    /// Remove a post from the mailbox, e.g. on deletion.
    async fn remove(&self, user_id: UserId, post_id: PostId) -> Result<()>;

    async fn get_interest_vector(&self, user_id: UserId) -> Result<Option<Vec<f32>>>;

    async fn set_interest_vector(&self, user_id: UserId, vector: &[f32]) -> Result<()>;
}

#[derive(Clone)]
pub struct RedisMailboxStore {
    conn: Arc<ConnectionManager>,
}

impl RedisMailboxStore {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::MailboxUnavailable(format!("invalid redis url: {}", e)))?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    pub async fn ping(&self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("mailbox store PING failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl MailboxStore for RedisMailboxStore {
    async fn push(
        &self,
        user_id: UserId,
        post_id: PostId,
        created_at_ts: f64,
        max_size: usize,
        ttl_secs: u64,
    ) -> Result<()> {
        let key = mailbox_key(user_id);

        // ZADD the member, then trim everything below the top `max_size` by
        // rank, then refresh TTL. Ordered so a crash mid-pipeline never
        // leaves the set larger than max_size for longer than one command.
        let mut pipe = redis::pipe();
        pipe.cmd("ZADD")
            .arg(&key)
            .arg(created_at_ts)
            .arg(post_id.to_string())
            .ignore()
            .cmd("ZREMRANGEBYRANK")
            .arg(&key)
            .arg(0)
            .arg(-(max_size as isize) - 1)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(ttl_secs)
            .ignore();

        pipe.query_async::<_, ()>(&mut self.conn.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("mailbox push failed for {}: {}", key, e);
                AppError::from(e)
            })?;

        Ok(())
    }

    async fn top(&self, user_id: UserId, limit: usize) -> Result<Vec<PostId>> {
        let key = mailbox_key(user_id);
        let limit = limit.max(1) - 1;

        let members: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(&key)
            .arg(0)
            .arg(limit as isize)
            .query_async(&mut self.conn.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("mailbox top failed for {}: {}", key, e);
                AppError::from(e)
            })?;

        Ok(members
            .into_iter()
            .filter_map(|raw| raw.parse().ok())
            .collect())
    }

    async fn remove(&self, user_id: UserId, post_id: PostId) -> Result<()> {
        let key = mailbox_key(user_id);
        redis::cmd("ZREM")
            .arg(&key)
            .arg(post_id.to_string())
            .query_async::<_, ()>(&mut self.conn.as_ref().clone())
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn get_interest_vector(&self, user_id: UserId) -> Result<Option<Vec<f32>>> {
        let key = interest_key(user_id);
        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut self.conn.as_ref().clone())
            .await
            .map_err(AppError::from)?;

        match value {
            Some(json) => {
                let vector = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("interest vector deserialization failed: {}", e))
                })?;
                Ok(Some(vector))
            }
            None => Ok(None),
        }
    }

    async fn set_interest_vector(&self, user_id: UserId, vector: &[f32]) -> Result<()> {
        let key = interest_key(user_id);
        let json = serde_json::to_string(vector).map_err(|e| {
            AppError::Internal(format!("interest vector serialization failed: {}", e))
        })?;
        redis::cmd("SET")
            .arg(&key)
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

    #[test]
    fn mailbox_key_format() {
        let user_id = UserId::new(uuid::Uuid::nil());
        assert_eq!(
            mailbox_key(user_id),
            format!("mailbox:{}", uuid::Uuid::nil())
        );
    }

    #[test]
    fn interest_key_format() {
        let user_id = UserId::new(uuid::Uuid::nil());
        assert_eq!(
            interest_key(user_id),
            format!("interest:{}", uuid::Uuid::nil())
        );
    }
}
