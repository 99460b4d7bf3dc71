//! Kafka producer wrapper for the `impressions` topic (stage 5 emission).

use crate::error::{AppError, Result};
use crate::models::{PostId, UserId};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct ImpressionsProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl ImpressionsProducer {
    pub fn new(bootstrap_servers: &str, topic: String) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create()
            .map_err(|e| AppError::DependencyUnavailable(format!("kafka producer: {}", e)))?;

        Ok(Self {
            producer,
            topic,
            timeout: Duration::from_secs(5),
        })
    }

    /// Publish one impression event. Failures are logged by the caller, not
    /// retried - the fire-and-forget emission point never blocks a response
    /// on this.
    pub async fn send(&self, viewer: UserId, post_id: PostId, timestamp_ms: i64) -> Result<()> {
        let key = viewer.to_string();
        let payload = serde_json::json!({
            "user_id": key,
            "post_id": post_id.to_string(),
            "timestamp": timestamp_ms,
        })
        .to_string();

        let record = FutureRecord::to(&self.topic).payload(&payload).key(&key);

        match self.producer.send(record, self.timeout).await {
            Ok(_) => Ok(()),
            Err((e, _)) => {
                warn!(user_id = %viewer, post_id = %post_id, error = %e, "impression publish failed");
                Err(AppError::DependencyUnavailable(e.to_string()))
            }
        }
    }
}
