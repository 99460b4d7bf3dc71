use actix_web::{web, App, HttpServer};
use feed_core::config::Config;
use feed_core::fanout::consumer as fanout_consumer;
use feed_core::feature_store::local_cache::LocalFeatureCache;
use feed_core::feature_store::FeatureStoreClient;
use feed_core::handlers::{get_feed, health, record_impressions};
use feed_core::impressions::producer::ImpressionsProducer;
use feed_core::impressions::ImpressionStoreClient;
use feed_core::mailbox::{MailboxStore, RedisMailboxStore};
use feed_core::metrics::metrics_handler;
use feed_core::ranking::RankingClient;
use feed_core::state::AppState;
use feed_core::vector_index::VectorIndexClient;
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.app.log_level, &config.app.env);

    tracing::info!(env = %config.app.env, "starting feed-service");

    let db = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to create database pool");
            std::process::exit(1);
        }
    };

    let mailbox: Arc<dyn MailboxStore> = match RedisMailboxStore::new(&config.redis.url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "failed to connect mailbox store");
            std::process::exit(1);
        }
    };

    let local_cache_client = match redis::Client::open(config.redis.url.as_str()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "invalid redis url for local feature cache");
            std::process::exit(1);
        }
    };
    let local_cache_conn = match ConnectionManager::new(local_cache_client).await {
        Ok(conn) => Arc::new(conn),
        Err(e) => {
            tracing::error!(error = %e, "failed to connect local feature cache");
            std::process::exit(1);
        }
    };
    let local_feature_cache = LocalFeatureCache::new(local_cache_conn);

    let feature_store = FeatureStoreClient::new(&config.feature_store);
    let ranking = RankingClient::new(&config.ranking);
    let impression_store = ImpressionStoreClient::new(&config.impression_store);
    let vector_index = VectorIndexClient::new(&config.vector_index, config.mailbox.embedding_dimension);

    let impressions_producer = match ImpressionsProducer::new(
        &config.kafka.bootstrap_servers,
        config.kafka.impressions_topic.clone(),
    ) {
        Ok(producer) => producer,
        Err(e) => {
            tracing::error!(error = %e, "failed to create impressions Kafka producer");
            std::process::exit(1);
        }
    };

    let config = Arc::new(config);

    let state = web::Data::new(AppState {
        config: config.clone(),
        db: db.clone(),
        mailbox: mailbox.clone(),
        local_feature_cache,
        feature_store,
        ranking,
        impression_store,
        vector_index,
        impressions_producer,
    });

    let fanout_db = db.clone();
    let fanout_mailbox = mailbox.clone();
    let fanout_cfg = config.fanout.clone();
    let mailbox_cfg = config.mailbox.clone();
    let kafka_cfg = config.kafka.clone();
    tokio::spawn(async move {
        match fanout_consumer::build_consumer(&kafka_cfg) {
            Ok(consumer) => {
                fanout_consumer::run(consumer, fanout_db, fanout_mailbox, fanout_cfg, mailbox_cfg)
                    .await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start fan-out Kafka consumer");
            }
        }
    });
    tracing::info!("fan-out worker consumer task spawned");

    let port = config.app.port;

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/feed", web::get().to(get_feed))
            .route("/feed/impressions", web::post().to(record_impressions))
            .route("/health", web::get().to(health))
            .route("/metrics", web::get().to(metrics_handler))
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}

fn init_tracing(log_level: &str, env: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if env == "development" {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    }
}
