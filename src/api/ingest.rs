//! `/api/ingest/*` handlers: URL crawling (async, job-tracked) and
//! synchronous PDF/DOCX file upload (spec §6).

use super::dto::{CrawlJobResponse, IngestFileResponse, IngestUrlRequest, IngestUrlResponse};
use super::{ApiError, ApiResult, AppState, TenantAuth};
use crate::error::RaglineError;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx"];

#[utoipa::path(
    post,
    path = "/api/ingest/url",
    tag = "ingest",
    request_body = IngestUrlRequest,
    responses((status = 200, body = IngestUrlResponse))
)]
pub async fn ingest_url_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
    Json(req): Json<IngestUrlRequest>,
) -> ApiResult<Json<IngestUrlResponse>> {
    let url = req.url.clone();
    let job_id = state.crawler.crawl(&tenant, &url, req.into_options()).await?;

    Ok(Json(IngestUrlResponse {
        job_id,
        status: "queued".to_string(),
        url,
        message: "crawl queued".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/ingest/url/{job_id}",
    tag = "ingest",
    params(("job_id" = Uuid, Path, description = "Crawl job id")),
    responses(
        (status = 200, body = CrawlJobResponse),
        (status = 404, description = "No such job for this tenant")
    )
)]
pub async fn ingest_url_status_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<CrawlJobResponse>> {
    let job = state
        .crawler
        .status(&tenant, job_id)
        .await?
        .ok_or_else(|| RaglineError::NotFound(format!("crawl job {job_id}")))?;

    Ok(Json(job.into()))
}

#[utoipa::path(
    post,
    path = "/api/ingest/file",
    tag = "ingest",
    responses(
        (status = 200, body = IngestFileResponse),
        (status = 400, description = "Missing file part or disallowed extension")
    )
)]
pub async fn ingest_file_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<IngestFileResponse>> {
    let mut filename = None;
    let mut bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RaglineError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(str::to_string);
            bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| RaglineError::Validation(format!("failed to read upload: {e}")))?,
            );
        }
    }

    let filename = filename.ok_or_else(|| RaglineError::Validation("missing file field".to_string()))?;
    let bytes = bytes.ok_or_else(|| RaglineError::Validation("missing file field".to_string()))?;

    let extension = filename
        .rsplit('.')
        .next()
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError(RaglineError::Validation(format!(
            "unsupported file extension .{extension}, expected one of {ALLOWED_EXTENSIONS:?}"
        ))));
    }

    // Content-derived, not the client-supplied filename: two uploads with
    // the same filename but different bytes must not collide on
    // `exists_source`'s at-most-once check.
    let source_ref = blake3::hash(&bytes).to_hex().to_string();

    let outcome = if extension == "pdf" {
        state.ingest.ingest_pdf(&tenant, &source_ref, &filename, &bytes).await?
    } else {
        state.ingest.ingest_docx(&tenant, &source_ref, &filename, &bytes).await?
    };

    Ok(Json(IngestFileResponse::from_outcome(filename, outcome)))
}
