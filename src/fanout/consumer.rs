//! Kafka consumer loop driving the fan-out worker (C2). Subscribes to the
//! `new-posts` topic with manual offset commit; the offset is only
//! committed once every mailbox push for the event has succeeded, so a
//! partial fan-out is retried on redelivery rather than silently dropped.

use crate::config::{FanoutConfig, KafkaConfig, MailboxConfig};
use crate::fanout::{fan_out_post_created, PostCreatedEvent};
use crate::mailbox::MailboxStore;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub fn build_consumer(kafka_cfg: &KafkaConfig) -> anyhow::Result<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &kafka_cfg.bootstrap_servers)
        .set("group.id", &kafka_cfg.group_id)
        .set("auto.offset.reset", "earliest")
        .set("enable.auto.commit", "false")
        .set("session.timeout.ms", "30000")
        .create()?;

    consumer.subscribe(&[&kafka_cfg.new_posts_topic])?;
    Ok(consumer)
}

/// Run the consumer loop until the process shuts down. Intended to be
/// driven from a detached `tokio::spawn`ed task in `main.rs`.
pub async fn run(
    consumer: StreamConsumer,
    db: PgPool,
    mailbox: Arc<dyn MailboxStore>,
    fanout_cfg: FanoutConfig,
    mailbox_cfg: MailboxConfig,
) {
    info!("fan-out worker consumer loop starting");

    loop {
        match tokio::time::timeout(Duration::from_secs(30), consumer.recv()).await {
            Ok(Ok(msg)) => {
                let payload = match msg.payload_view::<str>() {
                    Some(Ok(p)) => p,
                    Some(Err(e)) => {
                        warn!(error = %e, "non-utf8 new-posts payload, skipping");
                        continue;
                    }
                    None => continue,
                };

                let event: PostCreatedEvent = match serde_json::from_str(payload) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "failed to deserialize PostCreatedEvent, skipping");
                        continue;
                    }
                };

                match fan_out_post_created(&db, &mailbox, &fanout_cfg, &mailbox_cfg, &event).await
                {
                    Ok(_pushed) => {
                        if let Err(e) = consumer.commit_message(&msg, CommitMode::Async) {
                            warn!(error = %e, "failed to commit new-posts offset");
                        }
                    }
                    Err(e) => {
                        error!(post_id = %event.post_id, error = %e, "fan-out failed, leaving offset uncommitted for redelivery");
                    }
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "kafka consumer error");
            }
            Err(_) => {
                // Recv timeout; loop back and poll again.
            }
        }
    }
}
