//! Qdrant-backed accelerated vector backend.
//!
//! `tenant_id` is stored as a payload field and filtered server-side
//! (`Filter::must([Condition::matches(...)])`), never applied as a
//! post-filter, so an accelerated search can never return another
//! tenant's point even transiently.

use super::{num_candidates, Hit, Payload, VectorBackend};
use crate::error::{RaglineError, Result};
use crate::tenant::TenantId;
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const TENANT_FIELD: &str = "tenant_id";
const CHUNK_ID_FIELD: &str = "chunk_id";

pub struct QdrantVectorBackend {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorBackend {
    pub async fn connect(url: &str, collection: &str, dimension: u64, timeout_secs: u64) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RaglineError::Provider(format!("failed to build qdrant client: {e}")))?;

        let exists = client
            .collection_exists(collection)
            .await
            .map_err(|e| RaglineError::Provider(format!("qdrant collection_exists failed: {e}")))?;

        if !exists {
            info!("creating qdrant collection {}", collection);
            client
                .create_collection(
                    CreateCollectionBuilder::new(collection)
                        .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine)),
                )
                .await
                .map_err(|e| RaglineError::Provider(format!("qdrant create_collection failed: {e}")))?;
        }

        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }

    fn tenant_filter(tenant_id: &TenantId) -> Filter {
        Filter::must([Condition::matches(TENANT_FIELD, tenant_id.as_str().to_string())])
    }

    fn payload_to_map(payload: Payload, tenant_id: &TenantId, chunk_id: Uuid) -> HashMap<String, Value> {
        let mut map = payload;
        map.insert(TENANT_FIELD.to_string(), Value::String(tenant_id.as_str().to_string()));
        map.insert(CHUNK_ID_FIELD.to_string(), Value::String(chunk_id.to_string()));
        map
    }

    fn scored_point_to_hit(point: ScoredPoint) -> Option<Hit> {
        let payload: HashMap<String, Value> = point
            .payload
            .into_iter()
            .map(|(k, v)| (k, qdrant_value_to_json(v)))
            .collect();

        let chunk_id = payload.get(CHUNK_ID_FIELD)?.as_str()?.parse().ok()?;

        Some(Hit {
            chunk_id,
            score: point.score,
            payload,
        })
    }
}

#[async_trait]
impl VectorBackend for QdrantVectorBackend {
    async fn upsert(
        &self,
        tenant_id: &TenantId,
        chunk_id: Uuid,
        vector: &[f32],
        payload: Payload,
    ) -> Result<()> {
        let payload_map = Self::payload_to_map(payload, tenant_id, chunk_id);
        let point = PointStruct::new(chunk_id.to_string(), vector.to_vec(), payload_map);

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.clone(), vec![point]))
            .await
            .map_err(|e| RaglineError::Provider(format!("qdrant upsert failed: {e}")))?;

        Ok(())
    }

    async fn delete(&self, tenant_id: &TenantId, chunk_id: Uuid) -> Result<()> {
        let filter = Filter::must([
            Condition::matches(TENANT_FIELD, tenant_id.as_str().to_string()),
            Condition::matches(CHUNK_ID_FIELD, chunk_id.to_string()),
        ]);

        self.client
            .delete_points(
                qdrant_client::qdrant::DeletePointsBuilder::new(self.collection.clone())
                    .points(filter),
            )
            .await
            .map_err(|e| RaglineError::Provider(format!("qdrant delete failed: {e}")))?;

        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &TenantId,
        query_vector: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<Hit>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection.clone(), query_vector.to_vec(), k as u64)
                    .filter(Self::tenant_filter(tenant_id))
                    .score_threshold(min_score)
                    .params(qdrant_client::qdrant::SearchParamsBuilder::default().hnsw_ef(num_candidates(k) as u64))
                    .with_payload(true),
            )
            .await
            .map_err(|e| RaglineError::IndexUnavailable(format!("qdrant search failed: {e}")))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(Self::scored_point_to_hit)
            .collect())
    }
}

fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match value.kind {
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        _ => Value::Null,
    }
}
