//! SQLite-backed [`DocumentStore`].

use super::{Chunk, ChunkFilters, DocumentStore, Page, SourceKind, StoreStats};
use crate::error::{RaglineError, Result};
use crate::tenant::TenantId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("connecting document store at {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| RaglineError::Config(format!("invalid database_url: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            RaglineError::Config(format!("failed to run migrations: {e}"))
        })?;

        Ok(Self { pool })
    }

    /// Serializes an embedding to its little-endian byte layout, matching
    /// the layout [`crate::index::linear`] uses for its own vector blobs.
    pub fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    pub fn deserialize_embedding(data: &[u8]) -> Vec<f32> {
        data.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk> {
        let chunk_id: String = row.get("chunk_id");
        let tenant_id: String = row.get("tenant_id");
        let source_kind: String = row.get("source_kind");
        let created_at: String = row.get("created_at");
        let extra_json: String = row.get("extra");

        Ok(Chunk {
            chunk_id: Uuid::parse_str(&chunk_id)
                .map_err(|e| RaglineError::Generic(e.into()))?,
            tenant_id: TenantId::new(tenant_id),
            source_ref: row.get("source_ref"),
            source_kind: SourceKind::from_str(&source_kind)?,
            title: row.get("title"),
            body: row.get("body"),
            chunk_index: row.get::<i64, _>("chunk_index") as usize,
            total_chunks: row.get::<i64, _>("total_chunks") as usize,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| RaglineError::Generic(e.into()))?,
            extra: serde_json::from_str(&extra_json).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn put_chunk(&self, chunk: &Chunk, vector: Option<&[f32]>) -> Result<Uuid> {
        let extra_json = serde_json::to_string(&chunk.extra)?;
        let embedding_blob = vector.map(Self::serialize_embedding);

        sqlx::query(
            r#"
            INSERT INTO chunks
                (chunk_id, tenant_id, source_ref, source_kind, title, body,
                 chunk_index, total_chunks, created_at, extra, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(chunk_id) DO UPDATE SET
                source_ref = excluded.source_ref,
                source_kind = excluded.source_kind,
                title = excluded.title,
                body = excluded.body,
                chunk_index = excluded.chunk_index,
                total_chunks = excluded.total_chunks,
                extra = excluded.extra,
                embedding = excluded.embedding
            "#,
        )
        .bind(chunk.chunk_id.to_string())
        .bind(chunk.tenant_id.as_str())
        .bind(&chunk.source_ref)
        .bind(chunk.source_kind.as_str())
        .bind(&chunk.title)
        .bind(&chunk.body)
        .bind(chunk.chunk_index as i64)
        .bind(chunk.total_chunks as i64)
        .bind(chunk.created_at.to_rfc3339())
        .bind(extra_json)
        .bind(embedding_blob)
        .execute(&self.pool)
        .await?;

        debug!(chunk_id = %chunk.chunk_id, tenant_id = %chunk.tenant_id, "stored chunk");
        Ok(chunk.chunk_id)
    }

    async fn exists_source(&self, tenant_id: &TenantId, source_ref: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 AS present FROM chunks WHERE tenant_id = ?1 AND source_ref = ?2 LIMIT 1",
        )
        .bind(tenant_id.as_str())
        .bind(source_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn list_chunks(
        &self,
        tenant_id: &TenantId,
        filters: &ChunkFilters,
        page: Page,
    ) -> Result<(Vec<Chunk>, usize)> {
        let source_kind_str = filters.source_kind.map(|k| k.as_str().to_string());

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM chunks
            WHERE tenant_id = ?1
              AND (?2 IS NULL OR source_ref = ?2)
              AND (?3 IS NULL OR source_kind = ?3)
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(&filters.source_ref)
        .bind(&source_kind_str)
        .fetch_one(&self.pool)
        .await?
        .get("total");

        let rows = sqlx::query(
            r#"
            SELECT * FROM chunks
            WHERE tenant_id = ?1
              AND (?2 IS NULL OR source_ref = ?2)
              AND (?3 IS NULL OR source_kind = ?3)
            ORDER BY created_at ASC
            LIMIT ?4 OFFSET ?5
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(&filters.source_ref)
        .bind(&source_kind_str)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let chunks = rows
            .iter()
            .map(Self::row_to_chunk)
            .collect::<Result<Vec<_>>>()?;

        Ok((chunks, total as usize))
    }

    async fn get_many(&self, tenant_id: &TenantId, chunk_ids: &[Uuid]) -> Result<Vec<Chunk>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..chunk_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT * FROM chunks WHERE tenant_id = ?1 AND chunk_id IN ({placeholders})"
        );

        let mut q = sqlx::query(&query).bind(tenant_id.as_str());
        for id in chunk_ids {
            q = q.bind(id.to_string());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_chunk).collect()
    }

    async fn delete_by_source(&self, tenant_id: &TenantId, source_ref: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM chunks WHERE tenant_id = ?1 AND source_ref = ?2")
            .bind(tenant_id.as_str())
            .bind(source_ref)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn delete_by_id(&self, tenant_id: &TenantId, chunk_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM chunks WHERE tenant_id = ?1 AND chunk_id = ?2")
            .bind(tenant_id.as_str())
            .bind(chunk_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self, tenant_id: &TenantId) -> Result<StoreStats> {
        let rows = sqlx::query("SELECT source_ref, LENGTH(body) AS body_len FROM chunks WHERE tenant_id = ?1")
            .bind(tenant_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut per_source_counts: HashMap<String, usize> = HashMap::new();
        let mut total_len: u64 = 0;

        for row in &rows {
            let source_ref: String = row.get("source_ref");
            let body_len: i64 = row.get("body_len");
            *per_source_counts.entry(source_ref).or_insert(0) += 1;
            total_len += body_len as u64;
        }

        let total_chunks = rows.len();
        let avg_body_len = if total_chunks > 0 {
            total_len as f64 / total_chunks as f64
        } else {
            0.0
        };

        Ok(StoreStats {
            total_chunks,
            unique_sources: per_source_counts.len(),
            avg_body_len,
            per_source_counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChunkFilters;

    async fn store() -> SqliteDocumentStore {
        SqliteDocumentStore::connect("sqlite::memory:").await.unwrap()
    }

    fn sample_chunk(tenant: &str, source_ref: &str) -> Chunk {
        Chunk {
            chunk_id: Uuid::new_v4(),
            tenant_id: TenantId::new(tenant.to_string()),
            source_ref: source_ref.to_string(),
            source_kind: SourceKind::Web,
            title: "Example".to_string(),
            body: "Example body text.".to_string(),
            chunk_index: 0,
            total_chunks: 1,
            created_at: Utc::now(),
            extra: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = store().await;
        let chunk = sample_chunk("tenant-a", "https://example.com");
        store.put_chunk(&chunk, Some(&[1.0, 2.0, 3.0])).await.unwrap();

        let fetched = store
            .get_many(&chunk.tenant_id, &[chunk.chunk_id])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].body, chunk.body);
    }

    #[tokio::test]
    async fn exists_source_is_tenant_scoped() {
        let store = store().await;
        let chunk = sample_chunk("tenant-a", "https://example.com");
        store.put_chunk(&chunk, None).await.unwrap();

        assert!(store
            .exists_source(&TenantId::new("tenant-a"), "https://example.com")
            .await
            .unwrap());
        assert!(!store
            .exists_source(&TenantId::new("tenant-b"), "https://example.com")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn list_chunks_never_crosses_tenants() {
        let store = store().await;
        store
            .put_chunk(&sample_chunk("tenant-a", "src-1"), None)
            .await
            .unwrap();
        store
            .put_chunk(&sample_chunk("tenant-b", "src-2"), None)
            .await
            .unwrap();

        let (chunks, total) = store
            .list_chunks(
                &TenantId::new("tenant-a"),
                &ChunkFilters::default(),
                Page {
                    offset: 0,
                    limit: 10,
                },
            )
            .await
            .unwrap();

        assert_eq!(total, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].tenant_id.as_str(), "tenant-a");
    }

    #[tokio::test]
    async fn delete_by_source_only_removes_matching_tenant() {
        let store = store().await;
        let a = sample_chunk("tenant-a", "shared-source");
        let b = sample_chunk("tenant-b", "shared-source");
        store.put_chunk(&a, None).await.unwrap();
        store.put_chunk(&b, None).await.unwrap();

        let removed = store
            .delete_by_source(&TenantId::new("tenant-a"), "shared-source")
            .await
            .unwrap();
        assert_eq!(removed, 1);

        assert!(store
            .exists_source(&TenantId::new("tenant-b"), "shared-source")
            .await
            .unwrap());
    }
}
