//! `POST /feed/impressions` — fire-and-forget impression publish.

use crate::error::Result;
use crate::impressions::validate_user_id;
use crate::models::PostId;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RecordImpressionsRequest {
    pub user_id: String,
    pub post_ids: Vec<PostId>,
}

/// Publishes each `(user_id, post_id)` pair to the `impressions` topic from a
/// detached task and returns `204` immediately; publish failures are logged
/// only, never surfaced to the caller.
pub async fn record_impressions(
    body: web::Json<RecordImpressionsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let viewer = validate_user_id(&body.user_id)?;
    let post_ids = body.post_ids.clone();

    if post_ids.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }

    let producer = state.impressions_producer.clone();

    tokio::spawn(async move {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        for post_id in post_ids {
            let _ = producer.send(viewer, post_id, timestamp_ms).await;
        }
    });

    Ok(HttpResponse::NoContent().finish())
}
