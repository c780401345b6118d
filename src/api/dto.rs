//! Request/response bodies for the HTTP surface (spec §6).

use crate::crawl::{CrawlJob, CrawlOptions};
use crate::ingest::IngestionOutcome;
use crate::retriever::SourceRecord;
use crate::store::{Chunk, SourceKind};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[schema(example = "What is the refund policy?")]
    pub message: String,
    pub session_id: Option<String>,
    #[serde(default = "default_true")]
    pub use_history: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceRecord>,
    pub found_documents: usize,
    pub session_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClearHistoryRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearHistoryResponse {
    pub session_id: String,
    pub cleared: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub session_id: String,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryTurnDto {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<HistoryTurnDto>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestUrlRequest {
    #[schema(example = "https://example.com/docs")]
    pub url: String,
    #[serde(default)]
    pub max_depth: u32,
    #[serde(default)]
    pub follow_links: bool,
    #[serde(default)]
    pub use_browser: bool,
}

impl IngestUrlRequest {
    pub fn into_options(self) -> CrawlOptions {
        CrawlOptions {
            use_browser: self.use_browser,
            follow_links: self.follow_links,
            max_depth: self.max_depth.min(5),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestUrlResponse {
    pub job_id: Uuid,
    pub status: String,
    pub url: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestFileResponse {
    pub success: bool,
    pub filename: String,
    pub title: Option<String>,
    pub chunks_created: usize,
    pub total_characters: usize,
    pub message: String,
}

impl IngestFileResponse {
    pub fn from_outcome(filename: String, outcome: IngestionOutcome) -> Self {
        match outcome {
            IngestionOutcome::Ingested { title, chunks_created, total_characters } => Self {
                success: true,
                filename,
                title: Some(title),
                chunks_created,
                total_characters,
                message: "ingested".to_string(),
            },
            IngestionOutcome::InsufficientContent { total_characters } => Self {
                success: false,
                filename,
                title: None,
                chunks_created: 0,
                total_characters,
                message: "insufficient extractable content".to_string(),
            },
            IngestionOutcome::AlreadyIngested => Self {
                success: false,
                filename,
                title: None,
                chunks_created: 0,
                total_characters: 0,
                message: "already ingested".to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub database_reachable: bool,
    pub total_chunks: usize,
    pub unique_sources: usize,
    pub embeddings_enabled: bool,
    pub embedding_dimension: usize,
    pub llm_model: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DocumentsQuery {
    #[serde(default)]
    pub source_type: Option<SourceKind>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentSummary {
    pub chunk_id: Uuid,
    pub source_ref: String,
    pub source_kind: SourceKind,
    pub title: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl From<Chunk> for DocumentSummary {
    fn from(chunk: Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            source_ref: chunk.source_ref,
            source_kind: chunk.source_kind,
            title: chunk.title,
            chunk_index: chunk.chunk_index,
            total_chunks: chunk.total_chunks,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentSummary>,
    pub total: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteDocumentsQuery {
    #[serde(default)]
    pub doc_id: Option<Uuid>,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteDocumentsResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CrawlJobResponse {
    pub job_id: Uuid,
    pub seed_url: String,
    pub status: String,
    pub pages_crawled: u64,
    pub chunks_created: u64,
    pub error_message: Option<String>,
}

impl From<CrawlJob> for CrawlJobResponse {
    fn from(job: CrawlJob) -> Self {
        Self {
            job_id: job.job_id,
            seed_url: job.seed_url,
            status: job.status.as_str().to_string(),
            pages_crawled: job.pages_crawled,
            chunks_created: job.chunks_created,
            error_message: job.error_message,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub category: String,
}
