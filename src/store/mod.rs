//! Tenant-scoped persistent storage for chunks.

pub mod sqlite;

pub use sqlite::SqliteDocumentStore;

use crate::error::Result;
use crate::tenant::TenantId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Where a chunk's source material came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Web,
    Pdf,
    Docx,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Pdf => "pdf",
            SourceKind::Docx => "docx",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = crate::error::RaglineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "web" => Ok(SourceKind::Web),
            "pdf" => Ok(SourceKind::Pdf),
            "docx" => Ok(SourceKind::Docx),
            other => Err(crate::error::RaglineError::Validation(format!(
                "unknown source_kind: {other}"
            ))),
        }
    }
}

/// The unit of retrieval: a piece of source text plus its position in the
/// originating document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: Uuid,
    pub tenant_id: TenantId,
    pub source_ref: String,
    pub source_kind: SourceKind,
    pub title: String,
    pub body: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub created_at: DateTime<Utc>,
    pub extra: HashMap<String, String>,
}

/// Filters accepted by `list_chunks`.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilters {
    pub source_ref: Option<String>,
    pub source_kind: Option<SourceKind>,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub unique_sources: usize,
    pub avg_body_len: f64,
    pub per_source_counts: HashMap<String, usize>,
}

/// Tenant-scoped CRUD over [`Chunk`]s (spec §4.3).
///
/// Every method takes a `&TenantId` as its first argument and MUST scope
/// its query to it; there is no "all tenants" escape hatch at this layer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put_chunk(&self, chunk: &Chunk, vector: Option<&[f32]>) -> Result<Uuid>;

    async fn exists_source(&self, tenant_id: &TenantId, source_ref: &str) -> Result<bool>;

    async fn list_chunks(
        &self,
        tenant_id: &TenantId,
        filters: &ChunkFilters,
        page: Page,
    ) -> Result<(Vec<Chunk>, usize)>;

    async fn get_many(&self, tenant_id: &TenantId, chunk_ids: &[Uuid]) -> Result<Vec<Chunk>>;

    async fn delete_by_source(&self, tenant_id: &TenantId, source_ref: &str) -> Result<usize>;

    async fn delete_by_id(&self, tenant_id: &TenantId, chunk_id: Uuid) -> Result<bool>;

    async fn stats(&self, tenant_id: &TenantId) -> Result<StoreStats>;
}
