//! Vector similarity search: an accelerated ANN backend with a linear-scan
//! fallback (spec §4.4).

pub mod linear;
pub mod qdrant;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::tenant::TenantId;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// A small projection of a [`crate::store::Chunk`] carried alongside each
/// vector so a hit can be hydrated without a second store lookup.
pub type Payload = HashMap<String, Value>;

#[derive(Debug, Clone)]
pub struct Hit {
    pub chunk_id: Uuid,
    pub score: f32,
    pub payload: Payload,
}

/// `numCandidates` passed to the accelerated backend: wide enough for
/// recall, capped so latency stays bounded on large collections.
pub fn num_candidates(k: usize) -> usize {
    (k * 20).min(200)
}

/// A single vector backend — either the accelerated path or the fallback.
/// `VectorIndex` composes one of each and is what the rest of the crate
/// talks to.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn upsert(
        &self,
        tenant_id: &TenantId,
        chunk_id: Uuid,
        vector: &[f32],
        payload: Payload,
    ) -> Result<()>;

    async fn delete(&self, tenant_id: &TenantId, chunk_id: Uuid) -> Result<()>;

    async fn search(
        &self,
        tenant_id: &TenantId,
        query_vector: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<Hit>>;
}

/// Two-tier index: tries the accelerated backend first, falls back to a
/// linear scan on any error or when no accelerated backend is configured.
///
/// Both backends are always kept in sync on write so the fallback has a
/// complete, queryable mirror whenever it is needed.
pub struct VectorIndex {
    accelerated: Option<Arc<dyn VectorBackend>>,
    fallback: Arc<dyn VectorBackend>,
    default_min_score: f32,
}

impl VectorIndex {
    pub fn new(
        accelerated: Option<Arc<dyn VectorBackend>>,
        fallback: Arc<dyn VectorBackend>,
        config: &IndexConfig,
    ) -> Self {
        Self {
            accelerated,
            fallback,
            default_min_score: config.min_score,
        }
    }

    pub async fn upsert(
        &self,
        tenant_id: &TenantId,
        chunk_id: Uuid,
        vector: &[f32],
        payload: Payload,
    ) -> Result<()> {
        self.fallback
            .upsert(tenant_id, chunk_id, vector, payload.clone())
            .await?;

        if let Some(accelerated) = &self.accelerated {
            if let Err(e) = accelerated.upsert(tenant_id, chunk_id, vector, payload).await {
                warn!(error = %e, "accelerated index upsert failed, fallback mirror still written");
            }
        }

        Ok(())
    }

    pub async fn delete(&self, tenant_id: &TenantId, chunk_id: Uuid) -> Result<()> {
        self.fallback.delete(tenant_id, chunk_id).await?;

        if let Some(accelerated) = &self.accelerated {
            if let Err(e) = accelerated.delete(tenant_id, chunk_id).await {
                warn!(error = %e, "accelerated index delete failed, fallback mirror still updated");
            }
        }

        Ok(())
    }

    /// Tries the accelerated backend first; on any error (including "not
    /// configured"), logs the cause and executes a linear scan instead.
    pub async fn search(
        &self,
        tenant_id: &TenantId,
        query_vector: &[f32],
        k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<Hit>> {
        let min_score = min_score.unwrap_or(self.default_min_score);

        if let Some(accelerated) = &self.accelerated {
            match accelerated.search(tenant_id, query_vector, k, min_score).await {
                Ok(hits) => return Ok(hits),
                Err(e) => {
                    warn!(error = %e, "accelerated index search failed, falling back to linear scan");
                }
            }
        }

        self.fallback.search(tenant_id, query_vector, k, min_score).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_candidates_caps_at_200() {
        assert_eq!(num_candidates(5), 100);
        assert_eq!(num_candidates(20), 200);
        assert_eq!(num_candidates(1000), 200);
    }
}
