//! Linear-scan fallback backend: loads every vector for a tenant and
//! ranks by cosine similarity in-process. Used when the accelerated
//! backend errors or is not configured (spec §4.4, fallback path).

use super::{Hit, Payload, VectorBackend};
use crate::error::{RaglineError, Result};
use crate::tenant::TenantId;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

pub struct LinearVectorBackend {
    pool: SqlitePool,
}

impl LinearVectorBackend {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| RaglineError::Config(format!("invalid database_url: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vector_entries (
                tenant_id TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                embedding BLOB NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (tenant_id, chunk_id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Calculates cosine similarity between two equal-length vectors.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot / (norm_a * norm_b)
    }

    fn serialize(vector: &[f32]) -> Vec<u8> {
        vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize(data: &[u8]) -> Vec<f32> {
        data.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

#[async_trait]
impl VectorBackend for LinearVectorBackend {
    async fn upsert(
        &self,
        tenant_id: &TenantId,
        chunk_id: Uuid,
        vector: &[f32],
        payload: Payload,
    ) -> Result<()> {
        let payload_json = serde_json::to_string(&payload)?;

        sqlx::query(
            r#"
            INSERT INTO vector_entries (tenant_id, chunk_id, embedding, payload)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(tenant_id, chunk_id) DO UPDATE SET
                embedding = excluded.embedding,
                payload = excluded.payload
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(chunk_id.to_string())
        .bind(Self::serialize(vector))
        .bind(payload_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, tenant_id: &TenantId, chunk_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM vector_entries WHERE tenant_id = ?1 AND chunk_id = ?2")
            .bind(tenant_id.as_str())
            .bind(chunk_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &TenantId,
        query_vector: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<Hit>> {
        let rows = sqlx::query("SELECT chunk_id, embedding, payload FROM vector_entries WHERE tenant_id = ?1")
            .bind(tenant_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut hits: Vec<Hit> = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk_id_str: String = row.get("chunk_id");
            let embedding_blob: Vec<u8> = row.get("embedding");
            let payload_json: String = row.get("payload");

            let Ok(chunk_id) = Uuid::parse_str(&chunk_id_str) else {
                continue;
            };
            let vector = Self::deserialize(&embedding_blob);
            let score = Self::cosine_similarity(query_vector, &vector);

            if score < min_score {
                continue;
            }

            hits.push(Hit {
                chunk_id,
                score,
                payload: serde_json::from_str(&payload_json).unwrap_or_default(),
            });
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    async fn backend() -> LinearVectorBackend {
        LinearVectorBackend::connect("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((LinearVectorBackend::cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(LinearVectorBackend::cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_never_returns_a_point_from_another_tenant() {
        let backend = backend().await;
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();

        backend
            .upsert(&TenantId::new("tenant-a"), id_a, &[1.0, 0.0], HashMap::new())
            .await
            .unwrap();
        backend
            .upsert(&TenantId::new("tenant-b"), id_b, &[1.0, 0.0], HashMap::new())
            .await
            .unwrap();

        let hits = backend
            .search(&TenantId::new("tenant-a"), &[1.0, 0.0], 10, 0.0)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, id_a);
    }

    #[tokio::test]
    async fn search_respects_min_score_and_k() {
        let backend = backend().await;
        let tenant = TenantId::new("tenant-a");

        backend
            .upsert(&tenant, Uuid::new_v4(), &[1.0, 0.0], HashMap::new())
            .await
            .unwrap();
        backend
            .upsert(&tenant, Uuid::new_v4(), &[0.0, 1.0], HashMap::new())
            .await
            .unwrap();

        let hits = backend.search(&tenant, &[1.0, 0.0], 10, 0.5).await.unwrap();
        assert_eq!(hits.len(), 1);

        let hits = backend.search(&tenant, &[1.0, 0.0], 1, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
