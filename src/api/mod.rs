//! axum HTTP surface (spec §6): chat, ingestion, and status/document
//! admin endpoints layered over `Services`. Auth, routing, and dashboards
//! are explicitly out of core scope (spec §1) — this module is the thin
//! boundary, not where RAG logic lives.

pub mod chat;
pub mod dto;
pub mod ingest;
pub mod system;

use crate::error::RaglineError;
use crate::services::Services;
use crate::tenant::TenantId;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dto::{ErrorResponse, HealthResponse};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub type AppState = Arc<Services>;

/// Resolved tenant for the current request; an axum extractor so handlers
/// take `TenantAuth` instead of threading headers through by hand.
///
/// Dashboard chat authenticates with `Authorization: Bearer <token>`; the
/// public widget authenticates with `X-API-Key` (spec §6 "Authentication
/// boundary"). Either header resolves to the same `TenantId`.
pub struct TenantAuth(pub TenantId);

impl FromRequestParts<AppState> for TenantAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) {
            let value = header
                .to_str()
                .map_err(|_| RaglineError::Auth("malformed Authorization header".to_string()))?;
            let token = value
                .strip_prefix("Bearer ")
                .ok_or_else(|| RaglineError::Auth("Authorization header must be a Bearer token".to_string()))?;
            return Ok(TenantAuth(state.tenants.resolve_bearer(token)?));
        }

        if let Some(header) = parts.headers.get("X-API-Key") {
            let key = header
                .to_str()
                .map_err(|_| RaglineError::Auth("malformed X-API-Key header".to_string()))?;
            return Ok(TenantAuth(state.tenants.resolve_api_key(key)?));
        }

        Err(ApiError(RaglineError::Auth(
            "missing Authorization or X-API-Key header".to_string(),
        )))
    }
}

/// Wraps [`RaglineError`] so it can be returned directly from handlers;
/// converts via the taxonomy's own `status_code`/`category` (spec §7).
#[derive(Debug)]
pub struct ApiError(pub RaglineError);

impl From<RaglineError> for ApiError {
    fn from(err: RaglineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            category: self.0.category().to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        chat::chat_handler,
        chat::chat_widget_handler,
        chat::clear_history_handler,
        chat::history_handler,
        ingest::ingest_url_handler,
        ingest::ingest_url_status_handler,
        ingest::ingest_file_handler,
        system::status_handler,
        system::list_documents_handler,
        system::delete_documents_handler,
    ),
    components(schemas(
        dto::ChatRequest,
        dto::ChatResponse,
        dto::ClearHistoryRequest,
        dto::ClearHistoryResponse,
        dto::HistoryResponse,
        dto::HistoryTurnDto,
        dto::IngestUrlRequest,
        dto::IngestUrlResponse,
        dto::IngestFileResponse,
        dto::CrawlJobResponse,
        dto::StatusResponse,
        dto::DocumentSummary,
        dto::DocumentsResponse,
        dto::DeleteDocumentsResponse,
        dto::HealthResponse,
        dto::ErrorResponse,
        crate::retriever::SourceRecord,
        crate::store::SourceKind,
    )),
    tags(
        (name = "chat", description = "Chat completion over retrieved context"),
        (name = "ingest", description = "URL crawling and file upload ingestion"),
        (name = "system", description = "Status and document administration"),
    ),
    info(
        title = "Ragline API",
        version = "0.1.0",
        description = "Multi-tenant retrieval-augmented generation service",
    )
)]
struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat/", post(chat::chat_handler))
        .route("/api/chat/widget", post(chat::chat_widget_handler))
        .route("/api/chat/clear-history", post(chat::clear_history_handler))
        .route("/api/chat/history", get(chat::history_handler))
        .route("/api/ingest/url", post(ingest::ingest_url_handler))
        .route("/api/ingest/url/{job_id}", get(ingest::ingest_url_status_handler))
        .route("/api/ingest/file", post(ingest::ingest_file_handler))
        .route("/api/status", get(system::status_handler))
        .route(
            "/api/documents",
            get(system::list_documents_handler).delete(system::delete_documents_handler),
        )
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[utoipa::path(get, path = "/health", tag = "system", responses((status = 200, body = HealthResponse)))]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}
