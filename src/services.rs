//! Process-wide service handles, built once at startup and shared by
//! reference with every HTTP handler (spec §9's "Services" struct).

use crate::config::RaglineConfig;
use crate::crawl::{CrawlJobStore, CrawlOrchestrator, SqliteCrawlJobStore};
use crate::embedding::{self, EmbeddingProvider};
use crate::error::Result;
use crate::generator::{self, Generator};
use crate::index::linear::LinearVectorBackend;
use crate::index::qdrant::QdrantVectorBackend;
use crate::index::{VectorBackend, VectorIndex};
use crate::ingest::IngestionCoordinator;
use crate::session::{SessionMemory, SqliteChatHistoryStore};
use crate::store::sqlite::SqliteDocumentStore;
use crate::store::DocumentStore;
use crate::tenant::{StaticTenantResolver, TenantResolver};
use std::sync::Arc;
use tracing::{info, warn};

/// Every shared collaborator a handler needs, constructed once and
/// handed out to axum via `State`. Nothing here is rebuilt per-request.
pub struct Services {
    pub config: RaglineConfig,
    pub store: Arc<dyn DocumentStore>,
    pub index: Arc<VectorIndex>,
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<Generator>,
    pub session: Arc<SessionMemory>,
    pub crawler: Arc<CrawlOrchestrator>,
    pub ingest: Arc<IngestionCoordinator>,
    pub tenants: Arc<dyn TenantResolver>,
}

impl Services {
    pub async fn new(config: RaglineConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(SqliteDocumentStore::connect(&config.store.database_url).await?);
        let embedding: Arc<dyn EmbeddingProvider> = Arc::new(embedding::build_provider(&config.embedding)?);
        let dimension = embedding.dimension();

        let fallback = Arc::new(LinearVectorBackend::connect(&config.store.database_url).await?);
        let accelerated: Option<Arc<dyn VectorBackend>> = match &config.index.qdrant_url {
            Some(url) => {
                info!(url, "connecting to qdrant accelerated index");
                match QdrantVectorBackend::connect(
                    url,
                    &config.index.collection,
                    dimension as u64,
                    config.index.timeout_secs,
                )
                .await
                {
                    Ok(backend) => Some(Arc::new(backend)),
                    Err(e) => {
                        warn!(error = %e, "qdrant unavailable at startup, running fallback-only");
                        None
                    }
                }
            }
            None => None,
        };
        let index = Arc::new(VectorIndex::new(accelerated, fallback, &config.index));

        let generator = Arc::new(Generator::new(
            generator::build_provider(&config.generator)?,
            &config.generator,
        ));

        let history = Arc::new(SqliteChatHistoryStore::connect(&config.store.database_url).await?);
        let session = SessionMemory::new(&config.session, history);

        let jobs: Arc<dyn CrawlJobStore> =
            Arc::new(SqliteCrawlJobStore::connect(&config.store.database_url).await?);
        let crawler = Arc::new(CrawlOrchestrator::new(
            config.crawl.clone(),
            config.chunker.clone(),
            jobs,
            store.clone(),
            index.clone(),
            embedding.clone(),
        ));

        let ingest = Arc::new(IngestionCoordinator::new(
            &config.ingest,
            config.chunker.clone(),
            embedding.clone(),
            store.clone(),
            index.clone(),
        ));

        let tenants: Arc<dyn TenantResolver> = Arc::new(StaticTenantResolver::new(config.tenancy.clone()));

        info!(
            embedding_model = embedding.model_name(),
            dimension, "services initialized"
        );

        Ok(Self {
            config,
            store,
            index,
            embedding,
            generator,
            session,
            crawler,
            ingest,
            tenants,
        })
    }
}
