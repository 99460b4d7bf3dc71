//! HTTP client for the discovery vector index: an ANN search service over
//! post embeddings, reached as a plain HTTP collaborator per the external
//! interface contract (no gRPC, no embedded vector database).

use crate::config::VectorIndexConfig;
use crate::error::{AppError, Result};
use crate::models::{PostId, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    collection: &'a str,
    vector: &'a [f32],
    limit: usize,
    exclude_user_id: String,
    lookback_hours: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    post_id: PostId,
}

#[derive(Clone)]
pub struct VectorIndexClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    dimension: usize,
}

impl VectorIndexClient {
    pub fn new(config: &VectorIndexConfig, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            dimension,
        }
    }

    /// ANN search over the `posts` collection, excluding `viewer`'s own
    /// posts. `limit` posts are returned at most.
    pub async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        viewer: UserId,
        lookback_hours: u32,
    ) -> Result<Vec<PostId>> {
        if embedding.len() != self.dimension {
            return Err(AppError::BadRequest(format!(
                "query embedding dimension {} does not match expected dimension {}",
                embedding.len(),
                self.dimension
            )));
        }

        let body = SearchRequest {
            collection: "posts",
            vector: embedding,
            limit,
            exclude_user_id: viewer.to_string(),
            lookback_hours,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(user_id = %viewer, error = %e, "vector index request failed");
                AppError::from(e)
            })?
            .error_for_status()
            .map_err(AppError::from)?
            .json::<SearchResponse>()
            .await
            .map_err(AppError::from)?;

        Ok(response.results.into_iter().map(|hit| hit.post_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn config() -> VectorIndexConfig {
        VectorIndexConfig {
            base_url: "http://localhost:8104".to_string(),
            timeout_ms: 10_000,
        }
    }

    #[tokio::test]
    async fn rejects_embedding_with_wrong_dimension() {
        let client = VectorIndexClient::new(&config(), 384);
        let viewer = UserId::new(Uuid::new_v4());
        let result = client.search(&[0.1; 10], 100, viewer, 48).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
