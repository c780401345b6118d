//! CrawlOrchestrator (C8): fetches pages from a seed URL, extracts their
//! text, and feeds it through the chunker → embedder → store → index
//! pipeline, tracking progress as a durable `CrawlJob` (spec §4.8).

pub mod extract;
pub mod fetcher;
pub mod robots;

use crate::chunker;
use crate::config::{ChunkerConfig, CrawlConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::store::{Chunk, DocumentStore, SourceKind};
use crate::tenant::TenantId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fetcher::Fetcher;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use scraper::Html;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Queued,
    Running,
    Completed,
    Failed,
    /// Terminal, equivalent to `Failed` for statistics purposes (spec §5).
    Cancelled,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlStatus::Queued => "queued",
            CrawlStatus::Running => "running",
            CrawlStatus::Completed => "completed",
            CrawlStatus::Failed => "failed",
            CrawlStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for CrawlStatus {
    type Err = crate::error::RaglineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(CrawlStatus::Queued),
            "running" => Ok(CrawlStatus::Running),
            "completed" => Ok(CrawlStatus::Completed),
            "failed" => Ok(CrawlStatus::Failed),
            "cancelled" => Ok(CrawlStatus::Cancelled),
            other => Err(crate::error::RaglineError::Generic(anyhow::anyhow!(
                "unknown crawl status: {other}"
            ))),
        }
    }
}

/// Per-job crawl parameters, distinct from the orchestrator-wide politeness
/// settings in [`CrawlConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOptions {
    #[serde(default)]
    pub use_browser: bool,
    #[serde(default)]
    pub follow_links: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

fn default_max_depth() -> u32 {
    2
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            use_browser: false,
            follow_links: false,
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub job_id: Uuid,
    pub tenant_id: String,
    pub seed_url: String,
    pub options: CrawlOptions,
    pub status: CrawlStatus,
    pub pages_crawled: u64,
    pub chunks_created: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait CrawlJobStore: Send + Sync {
    async fn create(&self, job: &CrawlJob) -> Result<()>;
    async fn get(&self, tenant_id: &TenantId, job_id: Uuid) -> Result<Option<CrawlJob>>;
    async fn update_status(
        &self,
        job_id: Uuid,
        status: CrawlStatus,
        error_message: Option<&str>,
    ) -> Result<()>;
    async fn increment_counters(&self, job_id: Uuid, pages: u64, chunks: u64) -> Result<()>;
}

pub struct SqliteCrawlJobStore {
    pool: SqlitePool,
}

impl SqliteCrawlJobStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| crate::error::RaglineError::Config(format!("invalid database_url: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            crate::error::RaglineError::Config(format!("failed to run migrations: {e}"))
        })?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl CrawlJobStore for SqliteCrawlJobStore {
    async fn create(&self, job: &CrawlJob) -> Result<()> {
        let options_json = serde_json::to_string(&job.options)?;
        sqlx::query(
            "INSERT INTO crawl_jobs (job_id, tenant_id, seed_url, options, status, pages_crawled, chunks_created, created_at, updated_at, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(job.job_id.to_string())
        .bind(&job.tenant_id)
        .bind(&job.seed_url)
        .bind(options_json)
        .bind(job.status.as_str())
        .bind(job.pages_crawled as i64)
        .bind(job.chunks_created as i64)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .bind(&job.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, tenant_id: &TenantId, job_id: Uuid) -> Result<Option<CrawlJob>> {
        let row = sqlx::query(
            "SELECT job_id, tenant_id, seed_url, options, status, pages_crawled, chunks_created, created_at, updated_at, error_message
             FROM crawl_jobs WHERE job_id = ?1 AND tenant_id = ?2",
        )
        .bind(job_id.to_string())
        .bind(tenant_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let options_json: String = row.get("options");
        let status_str: String = row.get("status");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Ok(Some(CrawlJob {
            job_id: Uuid::parse_str(&row.get::<String, _>("job_id"))
                .map_err(|e| crate::error::RaglineError::Generic(e.into()))?,
            tenant_id: row.get("tenant_id"),
            seed_url: row.get("seed_url"),
            options: serde_json::from_str(&options_json).unwrap_or_default(),
            status: CrawlStatus::from_str(&status_str)?,
            pages_crawled: row.get::<i64, _>("pages_crawled") as u64,
            chunks_created: row.get::<i64, _>("chunks_created") as u64,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| crate::error::RaglineError::Generic(e.into()))?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map_err(|e| crate::error::RaglineError::Generic(e.into()))?
                .with_timezone(&Utc),
            error_message: row.get("error_message"),
        }))
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: CrawlStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE crawl_jobs SET status = ?1, error_message = ?2, updated_at = ?3 WHERE job_id = ?4",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment_counters(&self, job_id: Uuid, pages: u64, chunks: u64) -> Result<()> {
        sqlx::query(
            "UPDATE crawl_jobs SET pages_crawled = pages_crawled + ?1, chunks_created = chunks_created + ?2, updated_at = ?3 WHERE job_id = ?4",
        )
        .bind(pages as i64)
        .bind(chunks as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

struct Frontier {
    url: url::Url,
    depth: u32,
}

pub struct CrawlOrchestrator {
    config: CrawlConfig,
    chunker_config: ChunkerConfig,
    jobs: Arc<dyn CrawlJobStore>,
    store: Arc<dyn DocumentStore>,
    index: Arc<VectorIndex>,
    embedding: Arc<dyn EmbeddingProvider>,
    robots: Arc<robots::RobotsCache>,
    fetcher: Arc<Fetcher>,
    cancellation_tokens: Arc<std::sync::Mutex<HashMap<Uuid, tokio_util::sync::CancellationToken>>>,
}

impl CrawlOrchestrator {
    pub fn new(
        config: CrawlConfig,
        chunker_config: ChunkerConfig,
        jobs: Arc<dyn CrawlJobStore>,
        store: Arc<dyn DocumentStore>,
        index: Arc<VectorIndex>,
        embedding: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let fetcher = Arc::new(Fetcher::new(config.user_agent.clone(), config.fetch_timeout_secs));
        let robots = Arc::new(robots::RobotsCache::new(fetcher.client().clone()));

        Self {
            config,
            chunker_config,
            jobs,
            store,
            index,
            embedding,
            robots,
            fetcher,
            cancellation_tokens: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Requests cancellation of a running job. The worker observes this at
    /// its next suspension point and transitions the job to `cancelled`.
    pub fn cancel(&self, job_id: Uuid) {
        if let Some(token) = self
            .cancellation_tokens
            .lock()
            .expect("cancellation token map lock poisoned")
            .get(&job_id)
        {
            token.cancel();
        }
    }

    /// Queues a crawl job and spawns a background worker to run it to
    /// completion. Returns immediately with the new job's id.
    pub async fn crawl(
        &self,
        tenant_id: &TenantId,
        seed_url: &str,
        options: CrawlOptions,
    ) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let now = Utc::now();
        let job = CrawlJob {
            job_id,
            tenant_id: tenant_id.as_str().to_string(),
            seed_url: seed_url.to_string(),
            options: options.clone(),
            status: CrawlStatus::Queued,
            pages_crawled: 0,
            chunks_created: 0,
            created_at: now,
            updated_at: now,
            error_message: None,
        };
        self.jobs.create(&job).await?;

        let cancel_token = tokio_util::sync::CancellationToken::new();
        self.cancellation_tokens
            .lock()
            .expect("cancellation token map lock poisoned")
            .insert(job_id, cancel_token.clone());

        let worker = CrawlWorker {
            job_id,
            tenant_id: tenant_id.clone(),
            seed_url: seed_url.to_string(),
            options,
            config: self.config.clone(),
            chunker_config: self.chunker_config.clone(),
            jobs: self.jobs.clone(),
            store: self.store.clone(),
            index: self.index.clone(),
            embedding: self.embedding.clone(),
            robots: self.robots.clone(),
            fetcher: self.fetcher.clone(),
            cancel_token,
        };
        let cancellation_tokens = self.cancellation_tokens.clone();

        tokio::spawn(async move {
            worker.run().await;
            cancellation_tokens
                .lock()
                .expect("cancellation token map lock poisoned")
                .remove(&job_id);
        });

        Ok(job_id)
    }

    pub async fn status(&self, tenant_id: &TenantId, job_id: Uuid) -> Result<Option<CrawlJob>> {
        self.jobs.get(tenant_id, job_id).await
    }
}

struct CrawlWorker {
    job_id: Uuid,
    tenant_id: TenantId,
    seed_url: String,
    options: CrawlOptions,
    config: CrawlConfig,
    chunker_config: ChunkerConfig,
    jobs: Arc<dyn CrawlJobStore>,
    store: Arc<dyn DocumentStore>,
    index: Arc<VectorIndex>,
    embedding: Arc<dyn EmbeddingProvider>,
    robots: Arc<robots::RobotsCache>,
    fetcher: Arc<Fetcher>,
    cancel_token: tokio_util::sync::CancellationToken,
}

impl CrawlWorker {
    async fn run(&self) {
        if let Err(e) = self.jobs.update_status(self.job_id, CrawlStatus::Running, None).await {
            error!(job_id = %self.job_id, error = %e, "failed to mark crawl job running");
        }

        if self.cancel_token.is_cancelled() {
            let _ = self.jobs.update_status(self.job_id, CrawlStatus::Cancelled, None).await;
            return;
        }

        match self.crawl_to_completion().await {
            Ok(()) if self.cancel_token.is_cancelled() => {
                if let Err(e) = self.jobs.update_status(self.job_id, CrawlStatus::Cancelled, None).await {
                    error!(job_id = %self.job_id, error = %e, "failed to mark crawl job cancelled");
                }
            }
            Ok(()) => {
                if let Err(e) = self.jobs.update_status(self.job_id, CrawlStatus::Completed, None).await {
                    error!(job_id = %self.job_id, error = %e, "failed to mark crawl job completed");
                }
            }
            Err(e) => {
                error!(job_id = %self.job_id, error = %e, "crawl job failed");
                if let Err(e2) = self
                    .jobs
                    .update_status(self.job_id, CrawlStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    error!(job_id = %self.job_id, error = %e2, "failed to record crawl job failure");
                }
            }
        }
    }

    async fn crawl_to_completion(&self) -> Result<()> {
        let seed = extract::normalize_url(
            url::Url::parse(&self.seed_url)
                .map_err(|e| crate::error::RaglineError::Validation(format!("invalid seed_url: {e}")))?,
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));
        let pages_crawled = AtomicU64::new(0);

        let mut visited = std::collections::HashSet::new();
        visited.insert(seed.clone());

        let mut frontier = vec![Frontier { url: seed, depth: 0 }];
        let mut in_flight = FuturesUnordered::new();

        loop {
            if self.cancel_token.is_cancelled() {
                info!(job_id = %self.job_id, "crawl cancelled, stopping frontier");
                break;
            }

            while !frontier.is_empty() && in_flight.len() < self.config.max_concurrent_fetches.max(1) {
                if pages_crawled.load(Ordering::Relaxed) as usize + in_flight.len()
                    >= self.config.max_pages_per_job
                {
                    break;
                }
                let item = frontier.remove(0);
                let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                    crate::error::RaglineError::Generic(anyhow::anyhow!("semaphore closed: {e}"))
                })?;
                in_flight.push(self.fetch_and_process(item, permit));
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!(job_id = %self.job_id, "crawl cancelled, stopping frontier");
                    break;
                }
                next = in_flight.next() => next,
            };

            let Some(result) = next else {
                break;
            };

            match result {
                Ok(outcome) => {
                    pages_crawled.fetch_add(1, Ordering::Relaxed);
                    self.jobs
                        .increment_counters(self.job_id, 1, outcome.chunks_created as u64)
                        .await?;

                    if self.options.follow_links && outcome.depth < self.options.max_depth {
                        for link in outcome.links {
                            if visited.insert(link.clone()) {
                                frontier.push(Frontier { url: link, depth: outcome.depth + 1 });
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "page fetch/process failed, continuing crawl");
                }
            }

            if frontier.is_empty() && in_flight.is_empty() {
                break;
            }
            if pages_crawled.load(Ordering::Relaxed) as usize >= self.config.max_pages_per_job {
                break;
            }

            tokio::time::sleep(std::time::Duration::from_millis(self.config.request_delay_ms)).await;
        }

        Ok(())
    }

    async fn fetch_and_process(
        &self,
        item: Frontier,
        _permit: tokio::sync::OwnedSemaphorePermit,
    ) -> Result<PageOutcome> {
        let page_url = item.url.as_str().to_string();

        if self.config.respect_robots_txt
            && !self.robots.is_allowed(&item.url, &self.config.user_agent).await
        {
            info!(url = page_url, "skipped, disallowed by robots.txt");
            return Ok(PageOutcome::empty(item.depth));
        }

        if self.store.exists_source(&self.tenant_id, &page_url).await? {
            info!(url = page_url, "skipped, already ingested");
            return Ok(PageOutcome::empty(item.depth));
        }

        let page = self.fetcher.fetch(&page_url, self.options.use_browser).await?;
        let document = Html::parse_document(&page.html);

        let title = extract::extract_title(&document, &page.final_url);
        let body_text = extract::extract_body_text(&page.html);

        if body_text.len() < self.config.min_content_chars {
            warn!(url = page_url, len = body_text.len(), "skipped, too little extracted text");
            return Ok(PageOutcome::empty(item.depth));
        }

        let links = extract::extract_links(&document, &item.url, self.config.links_per_page);

        let chunks = chunker::chunk(&body_text, &self.chunker_config);
        let total_chunks = chunks.len();
        let mut chunks_created = 0;

        for (chunk_index, body) in chunks.into_iter().enumerate() {
            let vector = match self.embedding.embed(&body).await {
                Ok(v) => v,
                Err(e) if e.is_skippable_in_ingestion() => {
                    warn!(url = page_url, chunk_index, error = %e, "failed to embed chunk, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let chunk = Chunk {
                chunk_id: Uuid::new_v4(),
                tenant_id: self.tenant_id.clone(),
                source_ref: page_url.clone(),
                source_kind: SourceKind::Web,
                title: title.clone(),
                body,
                chunk_index,
                total_chunks,
                created_at: Utc::now(),
                extra: HashMap::from([("depth".to_string(), item.depth.to_string())]),
            };

            self.store.put_chunk(&chunk, Some(&vector)).await?;

            let payload = HashMap::from([
                ("source_ref".to_string(), serde_json::Value::String(chunk.source_ref.clone())),
                ("title".to_string(), serde_json::Value::String(chunk.title.clone())),
                ("chunk_index".to_string(), serde_json::Value::from(chunk.chunk_index)),
            ]);
            self.index.upsert(&self.tenant_id, chunk.chunk_id, &vector, payload).await?;

            chunks_created += 1;
        }

        Ok(PageOutcome {
            depth: item.depth,
            chunks_created,
            links,
        })
    }
}

struct PageOutcome {
    depth: u32,
    chunks_created: usize,
    links: Vec<url::Url>,
}

impl PageOutcome {
    fn empty(depth: u32) -> Self {
        Self {
            depth,
            chunks_created: 0,
            links: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in [
            CrawlStatus::Queued,
            CrawlStatus::Running,
            CrawlStatus::Completed,
            CrawlStatus::Failed,
            CrawlStatus::Cancelled,
        ] {
            assert_eq!(CrawlStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        assert!(CrawlStatus::from_str("sleeping").is_err());
    }

    #[test]
    fn crawl_options_default_to_no_link_following() {
        let options = CrawlOptions::default();
        assert!(!options.follow_links);
        assert!(!options.use_browser);
        assert_eq!(options.max_depth, 2);
    }

    #[test]
    fn crawl_options_deserialize_with_defaults_from_a_partial_object() {
        let options: CrawlOptions = serde_json::from_str(r#"{"follow_links": true}"#).unwrap();
        assert!(options.follow_links);
        assert!(!options.use_browser);
        assert_eq!(options.max_depth, 2);
    }
}
