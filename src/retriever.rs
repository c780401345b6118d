//! Retrieval: embeds a query, searches the vector index, and hydrates hits
//! into a prompt-ready context blob (spec §4.5).

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::store::DocumentStore;
use crate::tenant::TenantId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SourceRecord {
    pub number: usize,
    pub title: String,
    pub url: String,
    pub score: f32,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub context_blob: String,
    pub sources: Vec<SourceRecord>,
    pub found_count: usize,
}

pub struct Retriever {
    embedding: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    store: Arc<dyn DocumentStore>,
}

impl Retriever {
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            embedding,
            index,
            store,
        }
    }

    pub async fn retrieve(
        &self,
        tenant_id: &TenantId,
        query: &str,
        k: usize,
        min_score: Option<f32>,
    ) -> Result<RetrievalResult> {
        let query_vector = self.embedding.embed(query).await?;
        let hits = self.index.search(tenant_id, &query_vector, k, min_score).await?;

        if hits.is_empty() {
            return Ok(RetrievalResult {
                context_blob: String::new(),
                sources: Vec::new(),
                found_count: 0,
            });
        }

        let chunk_ids: Vec<_> = hits.iter().map(|h| h.chunk_id).collect();
        let chunks = self.store.get_many(tenant_id, &chunk_ids).await?;

        let dropped = chunk_ids.len() - chunks.len();
        if dropped > 0 {
            debug!(dropped, "dropped stale hits with no live chunk");
        }

        // `get_many` makes no ordering guarantee, so hydrate by id and
        // walk `hits` (already score-descending) to keep that order.
        let mut chunks_by_id: HashMap<_, _> = chunks.into_iter().map(|c| (c.chunk_id, c)).collect();

        let mut blocks = Vec::with_capacity(chunks_by_id.len());
        let mut sources = Vec::with_capacity(chunks_by_id.len());

        for hit in &hits {
            let Some(chunk) = chunks_by_id.remove(&hit.chunk_id) else {
                continue;
            };
            let number = sources.len() + 1;

            blocks.push(format!(
                "[Document {number}] Source: {} URL: {} Relevance: {:.3} Content: {}",
                chunk.title, chunk.source_ref, hit.score, chunk.body
            ));

            sources.push(SourceRecord {
                number,
                title: chunk.title,
                url: chunk.source_ref,
                score: hit.score,
                chunk_index: chunk.chunk_index,
            });
        }

        Ok(RetrievalResult {
            context_blob: blocks.join("\n\n"),
            found_count: sources.len(),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::index::linear::LinearVectorBackend;
    use crate::store::{Chunk, SourceKind, SqliteDocumentStore};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    struct FixedEmbeddingProvider;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbeddingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "fixed-test-model"
        }
    }

    async fn setup() -> (Retriever, TenantId, Uuid) {
        let tenant_id = TenantId::new("tenant-a");
        let store = Arc::new(SqliteDocumentStore::connect("sqlite::memory:").await.unwrap());
        let linear = Arc::new(LinearVectorBackend::connect("sqlite::memory:").await.unwrap());
        let index = Arc::new(VectorIndex::new(None, linear.clone(), &IndexConfig::default()));

        let chunk = Chunk {
            chunk_id: Uuid::new_v4(),
            tenant_id: tenant_id.clone(),
            source_ref: "https://example.com/page".to_string(),
            source_kind: SourceKind::Web,
            title: "Example Page".to_string(),
            body: "Body content about widgets.".to_string(),
            chunk_index: 0,
            total_chunks: 1,
            created_at: Utc::now(),
            extra: HashMap::new(),
        };

        store.put_chunk(&chunk, Some(&[1.0, 0.0])).await.unwrap();
        index
            .upsert(&tenant_id, chunk.chunk_id, &[1.0, 0.0], HashMap::new())
            .await
            .unwrap();

        let retriever = Retriever::new(Arc::new(FixedEmbeddingProvider), index, store);
        (retriever, tenant_id, chunk.chunk_id)
    }

    #[tokio::test]
    async fn retrieve_returns_numbered_context_blocks() {
        let (retriever, tenant_id, chunk_id) = setup().await;
        let result = retriever.retrieve(&tenant_id, "widgets", 5, None).await.unwrap();

        assert_eq!(result.found_count, 1);
        assert_eq!(result.sources[0].number, 1);
        assert!(result.context_blob.starts_with("[Document 1]"));
        assert!(result.context_blob.contains("Body content about widgets."));
        assert_eq!(result.sources[0].chunk_index, 0);
        let _ = chunk_id;
    }

    #[tokio::test]
    async fn context_blocks_follow_score_order_not_storage_order() {
        let tenant_id = TenantId::new("tenant-a");
        let store = Arc::new(SqliteDocumentStore::connect("sqlite::memory:").await.unwrap());
        let linear = Arc::new(LinearVectorBackend::connect("sqlite::memory:").await.unwrap());
        let index = Arc::new(VectorIndex::new(None, linear.clone(), &IndexConfig::default()));

        // Stored in ascending-score order, so a naive read of the store's
        // own row order would put the weaker match first.
        let weaker = Chunk {
            chunk_id: Uuid::new_v4(),
            tenant_id: tenant_id.clone(),
            source_ref: "https://example.com/weak".to_string(),
            source_kind: SourceKind::Web,
            title: "Weaker Match".to_string(),
            body: "Loosely related content.".to_string(),
            chunk_index: 0,
            total_chunks: 1,
            created_at: Utc::now(),
            extra: HashMap::new(),
        };
        let stronger = Chunk {
            chunk_id: Uuid::new_v4(),
            tenant_id: tenant_id.clone(),
            source_ref: "https://example.com/strong".to_string(),
            source_kind: SourceKind::Web,
            title: "Stronger Match".to_string(),
            body: "Directly relevant content.".to_string(),
            chunk_index: 0,
            total_chunks: 1,
            created_at: Utc::now(),
            extra: HashMap::new(),
        };

        store.put_chunk(&weaker, Some(&[0.6, 0.8])).await.unwrap();
        store.put_chunk(&stronger, Some(&[1.0, 0.0])).await.unwrap();
        index.upsert(&tenant_id, weaker.chunk_id, &[0.6, 0.8], HashMap::new()).await.unwrap();
        index.upsert(&tenant_id, stronger.chunk_id, &[1.0, 0.0], HashMap::new()).await.unwrap();

        let retriever = Retriever::new(Arc::new(FixedEmbeddingProvider), index, store);
        let result = retriever.retrieve(&tenant_id, "widgets", 5, None).await.unwrap();

        assert_eq!(result.sources.len(), 2);
        assert!(result.sources[0].score >= result.sources[1].score);
        assert_eq!(result.sources[0].title, "Stronger Match");
        assert_eq!(result.sources[1].title, "Weaker Match");

        let strong_pos = result.context_blob.find("Directly relevant").unwrap();
        let weak_pos = result.context_blob.find("Loosely related").unwrap();
        assert!(strong_pos < weak_pos);
        assert!(result.context_blob.starts_with("[Document 1]"));
    }

    #[tokio::test]
    async fn empty_hits_yield_empty_result() {
        let (retriever, tenant_id, _) = setup().await;
        let result = retriever
            .retrieve(&TenantId::new("tenant-with-no-data"), "widgets", 5, None)
            .await
            .unwrap();

        assert_eq!(result.found_count, 0);
        assert!(result.context_blob.is_empty());
        assert!(result.sources.is_empty());
        let _ = tenant_id;
    }
}
