//! `/api/status` and `/api/documents` handlers: service health and
//! tenant-scoped document administration (spec §6).

use super::dto::{
    DeleteDocumentsQuery, DeleteDocumentsResponse, DocumentSummary, DocumentsQuery,
    DocumentsResponse, StatusResponse,
};
use super::{ApiError, ApiResult, AppState, TenantAuth};
use crate::error::RaglineError;
use crate::store::{ChunkFilters, Page};
use axum::extract::{Query, State};
use axum::Json;
use tracing::warn;

/// Upper bound on chunks deleted by a single `source_url` delete request;
/// large enough for any one document, small enough to bind safely as a
/// SQL `LIMIT`.
const MAX_CHUNKS_PER_SOURCE: usize = 100_000;

#[utoipa::path(
    get,
    path = "/api/status",
    tag = "system",
    responses((status = 200, body = StatusResponse))
)]
pub async fn status_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
) -> ApiResult<Json<StatusResponse>> {
    let (database_reachable, total_chunks, unique_sources) = match state.store.stats(&tenant).await {
        Ok(stats) => (true, stats.total_chunks, stats.unique_sources),
        Err(e) => {
            warn!(error = %e, "store stats unavailable for /api/status");
            (false, 0, 0)
        }
    };

    Ok(Json(StatusResponse {
        database_reachable,
        total_chunks,
        unique_sources,
        embeddings_enabled: true,
        embedding_dimension: state.embedding.dimension(),
        llm_model: state.config.generator.model.clone(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "system",
    params(DocumentsQuery),
    responses((status = 200, body = DocumentsResponse))
)]
pub async fn list_documents_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
    Query(query): Query<DocumentsQuery>,
) -> ApiResult<Json<DocumentsResponse>> {
    let filters = ChunkFilters { source_ref: None, source_kind: query.source_type };
    let page = Page {
        offset: query.offset,
        limit: query.limit.unwrap_or(state.config.store.max_page_size),
    };

    let (chunks, total) = state.store.list_chunks(&tenant, &filters, page).await?;

    Ok(Json(DocumentsResponse {
        documents: chunks.into_iter().map(DocumentSummary::from).collect(),
        total,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/documents",
    tag = "system",
    params(DeleteDocumentsQuery),
    responses(
        (status = 200, body = DeleteDocumentsResponse),
        (status = 400, description = "Neither doc_id nor source_url was given")
    )
)]
pub async fn delete_documents_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
    Query(query): Query<DeleteDocumentsQuery>,
) -> ApiResult<Json<DeleteDocumentsResponse>> {
    let deleted = match (query.doc_id, query.source_url) {
        (Some(chunk_id), _) => {
            let deleted = state.store.delete_by_id(&tenant, chunk_id).await?;
            state.index.delete(&tenant, chunk_id).await?;
            usize::from(deleted)
        }
        (None, Some(source_ref)) => {
            let chunks = state
                .store
                .list_chunks(
                    &tenant,
                    &ChunkFilters { source_ref: Some(source_ref.clone()), source_kind: None },
                    Page { offset: 0, limit: MAX_CHUNKS_PER_SOURCE },
                )
                .await?
                .0;
            for chunk in &chunks {
                state.index.delete(&tenant, chunk.chunk_id).await?;
            }
            state.store.delete_by_source(&tenant, &source_ref).await?
        }
        (None, None) => {
            return Err(ApiError(RaglineError::Validation(
                "either doc_id or source_url is required".to_string(),
            )))
        }
    };

    Ok(Json(DeleteDocumentsResponse { deleted }))
}
