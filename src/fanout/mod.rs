//! Fan-out worker (C2): consumes `new-posts` events and pushes each new
//! post into every follower's mailbox, subject to a follower cap.
//!
//! Beyond `follower_cap` we stop pushing. Celebrity/brand accounts rely on
//! the candidate generator's discovery path rather than mailbox fan-out -
//! pushing to hundreds of thousands of mailboxes per post is not worth the
//! write amplification.

pub mod consumer;

use crate::config::{FanoutConfig, MailboxConfig};
use crate::error::{AppError, Result};
use crate::mailbox::MailboxStore;
use crate::models::{PostId, UserId};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Payload shape for a post-created event on the `new-posts` topic.
#[derive(Debug, Clone, Deserialize)]
pub struct PostCreatedEvent {
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
}

/// Fetch followers of `author_id` via parameterized SQL and push the post
/// into each of their mailboxes, bounded to at most `push_concurrency`
/// concurrent mailbox writes. Returns the number of mailboxes actually
/// pushed to.
///
/// Celebrity bypass: an author with `follower_cap` or more followers skips
/// fan-out entirely - those followers pick the post up via the discovery
/// path at read time instead.
pub async fn fan_out_post_created(
    db: &PgPool,
    mailbox: &Arc<dyn MailboxStore>,
    fanout_cfg: &FanoutConfig,
    mailbox_cfg: &MailboxConfig,
    event: &PostCreatedEvent,
) -> Result<usize> {
    let followers = fetch_followers(db, event.user_id, fanout_cfg.follower_cap).await?;

    if followers.is_empty() {
        debug!(author_id = %event.user_id, "no followers to fan out to");
        return Ok(0);
    }

    if followers.len() >= fanout_cfg.follower_cap as usize {
        info!(
            author_id = %event.user_id,
            follower_cap = fanout_cfg.follower_cap,
            "celebrity bypass: skipping fan-out, relying on discovery path"
        );
        return Ok(0);
    }

    let post_id = event.post_id;
    let score = chrono::Utc::now().timestamp() as f64;
    let max_size = mailbox_cfg.max_size;
    let ttl_secs = mailbox_cfg.ttl_secs;

    let results: Vec<Result<()>> = stream::iter(followers.into_iter().map(|follower_id| {
        let mailbox = Arc::clone(mailbox);
        async move { mailbox.push(follower_id, post_id, score, max_size, ttl_secs).await }
    }))
    .buffer_unordered(fanout_cfg.push_concurrency)
    .collect()
    .await;

    let mut pushed = 0usize;
    let mut failed = 0usize;
    for result in results {
        match result {
            Ok(()) => pushed += 1,
            Err(e) => {
                failed += 1;
                warn!(post_id = %post_id, error = %e, "mailbox push failed");
            }
        }
    }

    if failed > 0 {
        // Leave the Kafka offset uncommitted when any push fails so
        // redelivery can retry; partial fan-out is not treated as success
        // at the call site.
        return Err(AppError::MailboxUnavailable(format!(
            "{} of {} mailbox pushes failed",
            failed,
            pushed + failed
        )));
    }

    info!(post_id = %post_id, author_id = %event.user_id, pushed, "fan-out complete");
    Ok(pushed)
}

/// Fetch at most `cap + 1` followers so the caller can distinguish "exactly
/// at the cap" from "over the cap" without a separate COUNT query.
async fn fetch_followers(db: &PgPool, author_id: UserId, cap: u32) -> Result<Vec<UserId>> {
    let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
        "SELECT follower_id FROM follows WHERE followee_id = $1 LIMIT $2",
    )
    .bind(author_id.0)
    .bind(cap as i64 + 1)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|(id,)| UserId::new(id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_created_event_deserializes_from_json() {
        let json = r#"{
            "post_id": "123e4567-e89b-12d3-a456-426614174000",
            "user_id": "987fcdeb-51a2-3bc4-d567-890123456789",
            "content": "hello"
        }"#;

        let event: PostCreatedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event.post_id.to_string(),
            "123e4567-e89b-12d3-a456-426614174000"
        );
        assert_eq!(event.content, "hello");
    }
}
