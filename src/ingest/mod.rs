//! IngestionCoordinator (C9): the same chunk→embed→store→index pipeline
//! C8 uses, fed from uploaded PDF/DOCX bytes instead of crawled pages
//! (spec §4.9).

pub mod docx;
#[cfg(feature = "pdf")]
pub mod pdf;

use crate::chunker;
use crate::config::{ChunkerConfig, IngestConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::store::{Chunk, DocumentStore, SourceKind};
use crate::tenant::TenantId;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestionOutcome {
    Ingested {
        title: String,
        chunks_created: usize,
        total_characters: usize,
    },
    /// Fewer than `min_content_chars` of extractable text; not an error.
    InsufficientContent { total_characters: usize },
    /// `(tenant_id, source_ref)` already has chunks; this upload is a no-op.
    AlreadyIngested,
}

pub struct IngestionCoordinator {
    chunker_config: ChunkerConfig,
    min_content_chars: usize,
    embedding: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn DocumentStore>,
    index: Arc<VectorIndex>,
}

impl IngestionCoordinator {
    pub fn new(
        config: &IngestConfig,
        chunker_config: ChunkerConfig,
        embedding: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn DocumentStore>,
        index: Arc<VectorIndex>,
    ) -> Self {
        Self {
            chunker_config,
            min_content_chars: config.min_content_chars,
            embedding,
            store,
            index,
        }
    }

    #[cfg(feature = "pdf")]
    pub async fn ingest_pdf(
        &self,
        tenant_id: &TenantId,
        source_ref: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestionOutcome> {
        let extracted = pdf::extract(bytes)?;
        let extra = HashMap::from([("page_count".to_string(), extracted.page_count.to_string())]);
        self.ingest_text(
            tenant_id,
            source_ref,
            filename,
            &extracted.full_text(),
            SourceKind::Pdf,
            extra,
        )
        .await
    }

    #[cfg(not(feature = "pdf"))]
    pub async fn ingest_pdf(
        &self,
        _tenant_id: &TenantId,
        _source_ref: &str,
        _filename: &str,
        _bytes: &[u8],
    ) -> Result<IngestionOutcome> {
        Err(crate::error::RaglineError::Config(
            "PDF ingestion requires the crate to be built with the `pdf` feature".to_string(),
        ))
    }

    pub async fn ingest_docx(
        &self,
        tenant_id: &TenantId,
        source_ref: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestionOutcome> {
        let extracted = docx::extract(bytes)?;
        let extra = HashMap::from([(
            "paragraph_count".to_string(),
            extracted.paragraph_count.to_string(),
        )]);
        self.ingest_text(
            tenant_id,
            source_ref,
            filename,
            &extracted.full_text(),
            SourceKind::Docx,
            extra,
        )
        .await
    }

    async fn ingest_text(
        &self,
        tenant_id: &TenantId,
        source_ref: &str,
        title: &str,
        text: &str,
        source_kind: SourceKind,
        extra: HashMap<String, String>,
    ) -> Result<IngestionOutcome> {
        if self.store.exists_source(tenant_id, source_ref).await? {
            return Ok(IngestionOutcome::AlreadyIngested);
        }

        let total_characters = text.chars().count();
        if total_characters < self.min_content_chars {
            return Ok(IngestionOutcome::InsufficientContent { total_characters });
        }

        let chunks = chunker::chunk(text, &self.chunker_config);
        let total_chunks = chunks.len();
        let mut chunks_created = 0;

        for (chunk_index, body) in chunks.into_iter().enumerate() {
            let vector = match self.embedding.embed(&body).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(source_ref, chunk_index, error = %e, "failed to embed chunk, skipping");
                    continue;
                }
            };

            let chunk = Chunk {
                chunk_id: Uuid::new_v4(),
                tenant_id: tenant_id.clone(),
                source_ref: source_ref.to_string(),
                source_kind,
                title: title.to_string(),
                body,
                chunk_index,
                total_chunks,
                created_at: Utc::now(),
                extra: extra.clone(),
            };

            self.store.put_chunk(&chunk, Some(&vector)).await?;

            let payload = HashMap::from([
                ("source_ref".to_string(), serde_json::Value::String(chunk.source_ref.clone())),
                ("title".to_string(), serde_json::Value::String(chunk.title.clone())),
                ("chunk_index".to_string(), serde_json::Value::from(chunk.chunk_index)),
            ]);
            self.index.upsert(tenant_id, chunk.chunk_id, &vector, payload).await?;

            chunks_created += 1;
        }

        Ok(IngestionOutcome::Ingested {
            title: title.to_string(),
            chunks_created,
            total_characters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::CachedEmbeddingProvider;
    use crate::index::linear::LinearVectorBackend;
    use crate::store::sqlite::SqliteDocumentStore;
    use async_trait::async_trait;

    struct FixedEmbeddingProvider;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbeddingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.3])
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "fixed-test-model"
        }
    }

    async fn coordinator() -> (IngestionCoordinator, TenantId) {
        let store = Arc::new(SqliteDocumentStore::connect("sqlite::memory:").await.unwrap());
        let backend = Arc::new(LinearVectorBackend::connect("sqlite::memory:").await.unwrap());
        let index = Arc::new(VectorIndex::new(None, backend, &crate::config::IndexConfig::default()));
        let embedding = Arc::new(CachedEmbeddingProvider::new(Arc::new(FixedEmbeddingProvider), 10));

        let coordinator = IngestionCoordinator::new(
            &IngestConfig::default(),
            ChunkerConfig { chunk_size: 500, overlap: 50 },
            embedding,
            store,
            index,
        );

        (coordinator, TenantId::new("tenant-a"))
    }

    #[tokio::test]
    async fn short_text_yields_insufficient_content() {
        let (coordinator, tenant) = coordinator().await;
        let outcome = coordinator
            .ingest_text(&tenant, "doc-1", "Doc", "too short", SourceKind::Docx, HashMap::new())
            .await
            .unwrap();

        assert!(matches!(outcome, IngestionOutcome::InsufficientContent { total_characters: 9 }));
    }

    #[tokio::test]
    async fn long_text_is_chunked_and_ingested() {
        let (coordinator, tenant) = coordinator().await;
        let text = "Rust is great. ".repeat(100);
        let outcome = coordinator
            .ingest_text(&tenant, "doc-2", "Doc", &text, SourceKind::Docx, HashMap::new())
            .await
            .unwrap();

        match outcome {
            IngestionOutcome::Ingested { chunks_created, .. } => assert!(chunks_created > 0),
            other => panic!("expected Ingested, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn repeated_ingestion_of_the_same_source_is_a_no_op() {
        let (coordinator, tenant) = coordinator().await;
        let text = "Rust is great. ".repeat(100);
        coordinator
            .ingest_text(&tenant, "doc-3", "Doc", &text, SourceKind::Docx, HashMap::new())
            .await
            .unwrap();

        let second = coordinator
            .ingest_text(&tenant, "doc-3", "Doc", &text, SourceKind::Docx, HashMap::new())
            .await
            .unwrap();

        assert!(matches!(second, IngestionOutcome::AlreadyIngested));
    }
}
