//! Process-wide singleton clients, constructed once in `main.rs` and handed
//! to handlers as `web::Data<AppState>`.

use crate::config::Config;
use crate::feature_store::local_cache::LocalFeatureCache;
use crate::feature_store::FeatureStoreClient;
use crate::impressions::producer::ImpressionsProducer;
use crate::impressions::ImpressionStoreClient;
use crate::mailbox::MailboxStore;
use crate::ranking::RankingClient;
use crate::vector_index::VectorIndexClient;
use sqlx::PgPool;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub db: PgPool,
    pub mailbox: Arc<dyn MailboxStore>,
    pub local_feature_cache: LocalFeatureCache,
    pub feature_store: FeatureStoreClient,
    pub ranking: RankingClient,
    pub impression_store: ImpressionStoreClient,
    pub vector_index: VectorIndexClient,
    pub impressions_producer: ImpressionsProducer,
}
