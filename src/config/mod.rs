use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub mailbox: MailboxConfig,
    pub fanout: FanoutConfig,
    pub candidates: CandidateConfig,
    pub ranking: RankingConfig,
    pub feature_store: FeatureStoreConfig,
    pub impression_store: ImpressionStoreConfig,
    pub vector_index: VectorIndexConfig,
    pub kafka: KafkaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
    pub request_deadline_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// C1 Mailbox Store tuning. `max_size` and `ttl_secs` are the invariants
/// every mailbox write enforces (bounded size, TTL refreshed on push).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    pub max_size: usize,
    pub ttl_secs: u64,
    pub embedding_dimension: usize,
}

/// C2 Fan-out Worker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    pub follower_cap: u32,
    pub push_concurrency: usize,
}

/// C3 Candidate Generator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub max_candidates: usize,
    pub discovery_lookback_hours: u32,
}

/// C5 stage 3c ranking-service client + fallback tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub candidate_limit: usize,
}

/// C5 stage 3a feature-store client tuning. The affinity call carries its
/// own independent timeout budget, separate from the primary call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureStoreConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub affinity_timeout_ms: u64,
}

/// C4 impression-store client tuning. `lookback_hours` is the dedicated
/// impression-dedup window (`pinot_lookback_hours`, default 24h) - kept
/// separate from `CandidateConfig::discovery_lookback_hours`, which governs
/// discovery-candidate freshness instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpressionStoreConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub lookback_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub group_id: String,
    pub new_posts_topic: String,
    pub impressions_topic: String,
}

/// Page size returned from `GET /feed`. Not part of any nested struct since
/// it governs the handler directly rather than a single component.
pub const FEED_PAGE_SIZE: usize = 20;
pub const MAX_AUTHOR_POSTS: usize = 2;

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                request_deadline_ms: std::env::var("REQUEST_DEADLINE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3_000),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
            mailbox: MailboxConfig {
                max_size: std::env::var("MAILBOX_MAX_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(500),
                ttl_secs: std::env::var("MAILBOX_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(86_400),
                embedding_dimension: std::env::var("EMBEDDING_DIMENSION")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(384),
            },
            fanout: FanoutConfig {
                follower_cap: std::env::var("FAN_OUT_FOLLOWER_CAP")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10_000),
                push_concurrency: std::env::var("FAN_OUT_PUSH_CONCURRENCY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(64),
            },
            candidates: CandidateConfig {
                max_candidates: std::env::var("MAX_CANDIDATES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(150),
                discovery_lookback_hours: std::env::var("DISCOVERY_LOOKBACK_HOURS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(48),
            },
            ranking: RankingConfig {
                base_url: std::env::var("RANKING_SERVICE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8101".to_string()),
                timeout_ms: std::env::var("RANKING_SERVICE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2_000),
                candidate_limit: std::env::var("RANKING_CANDIDATE_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(100),
            },
            feature_store: FeatureStoreConfig {
                base_url: std::env::var("FEATURE_STORE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8102".to_string()),
                timeout_ms: std::env::var("FEATURE_STORE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1_500),
                affinity_timeout_ms: std::env::var("FEATURE_STORE_AFFINITY_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1_500),
            },
            impression_store: ImpressionStoreConfig {
                base_url: std::env::var("IMPRESSION_STORE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8103".to_string()),
                timeout_ms: std::env::var("IMPRESSION_STORE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5_000),
                lookback_hours: std::env::var("PINOT_LOOKBACK_HOURS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(24),
            },
            vector_index: VectorIndexConfig {
                base_url: std::env::var("VECTOR_INDEX_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8104".to_string()),
                timeout_ms: std::env::var("VECTOR_INDEX_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10_000),
            },
            kafka: KafkaConfig {
                bootstrap_servers: std::env::var("KAFKA_BOOTSTRAP_SERVERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| "feed-fanout-worker".to_string()),
                new_posts_topic: std::env::var("KAFKA_NEW_POSTS_TOPIC")
                    .unwrap_or_else(|_| "new-posts".to_string()),
                impressions_topic: std::env::var("KAFKA_IMPRESSIONS_TOPIC")
                    .unwrap_or_else(|_| "impressions".to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_page_size_matches_spec_default() {
        assert_eq!(FEED_PAGE_SIZE, 20);
    }

    #[test]
    fn max_author_posts_matches_spec_default() {
        assert_eq!(MAX_AUTHOR_POSTS, 2);
    }
}
