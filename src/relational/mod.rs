//! Relational store access: viewer resolution (stage 0) and batch post
//! hydration with an author join (stage 4).

use crate::error::{AppError, Result};
use crate::models::{PostId, PostRecord, UserId};
use sqlx::PgPool;

/// Confirm `viewer` exists in the `users` table. `AppError::NotFound` if
/// missing, `AppError::Internal`/`ServiceUnavailable` mapping happens via
/// the `From<sqlx::Error>` impl on connection errors.
pub async fn resolve_viewer(db: &PgPool, viewer: UserId) -> Result<()> {
    let exists: Option<(bool,)> = sqlx::query_as("SELECT true FROM users WHERE id = $1")
        .bind(viewer.0)
        .fetch_optional(db)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => AppError::NotFound(format!("viewer {} not found", viewer)),
            other => AppError::ServiceUnavailable(other.to_string()),
        })?;

    match exists {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("viewer {} not found", viewer))),
    }
}

/// Batch-load post records for `post_ids`, joining the author's username
/// and display name. Posts that no longer exist (e.g. deleted after being
/// cached in a mailbox) are simply absent from the result, not an error.
pub async fn load_posts(db: &PgPool, post_ids: &[PostId]) -> Result<Vec<PostRecord>> {
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<uuid::Uuid> = post_ids.iter().map(|p| p.0).collect();

    let rows: Vec<(
        uuid::Uuid,
        uuid::Uuid,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        i64,
        chrono::DateTime<chrono::Utc>,
    )> = sqlx::query_as(
        r#"
        SELECT
            p.id,
            p.author_id,
            u.username,
            u.display_name,
            p.content,
            p.media_key,
            p.media_type,
            p.like_count,
            p.created_at
        FROM posts p
        JOIN users u ON u.id = p.author_id
        WHERE p.id = ANY($1)
        "#,
    )
    .bind(&ids)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(
                post_id,
                author_id,
                username,
                display_name,
                content,
                media_key,
                media_type,
                like_count,
                created_at,
            )| PostRecord {
                post_id: PostId::new(post_id),
                author_id: UserId::new(author_id),
                author_username: username,
                author_display_name: display_name,
                content,
                media_key,
                media_type,
                like_count: like_count.max(0) as u64,
                created_at,
            },
        )
        .collect())
}
