//! `/api/chat/*` handlers: retrieval-augmented chat for the dashboard
//! (bearer auth) and the public widget (API-key auth) (spec §6).

use super::dto::{
    ChatRequest, ChatResponse, ClearHistoryRequest, ClearHistoryResponse, HistoryQuery,
    HistoryResponse, HistoryTurnDto,
};
use super::{AppState, ApiResult, TenantAuth};
use crate::llm::Role;
use crate::retriever::Retriever;
use axum::extract::{Query, State};
use axum::Json;
use uuid::Uuid;

const TOP_K: usize = 5;

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

async fn answer(state: &AppState, tenant: &crate::tenant::TenantId, req: ChatRequest) -> ApiResult<ChatResponse> {
    let session_id = req.session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let retriever = Retriever::new(state.embedding.clone(), state.index.clone(), state.store.clone());
    let retrieval = retriever.retrieve(tenant, &req.message, TOP_K, None).await?;

    let history = if req.use_history {
        state.session.recent_turns(tenant, &session_id, state.config.session.ring_size).await
    } else {
        Vec::new()
    };

    let answer = state
        .generator
        .answer(&req.message, &retrieval.context_blob, &history, None)
        .await;

    state.session.record_turn(tenant, &session_id, Role::User, req.message).await;
    state.session.record_turn(tenant, &session_id, Role::Assistant, answer.clone()).await;

    Ok(ChatResponse {
        answer,
        sources: retrieval.sources,
        found_documents: retrieval.found_count,
        session_id,
    })
}

#[utoipa::path(
    post,
    path = "/api/chat/",
    tag = "chat",
    request_body = ChatRequest,
    responses((status = 200, body = ChatResponse))
)]
pub async fn chat_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    Ok(Json(answer(&state, &tenant, req).await?))
}

#[utoipa::path(
    post,
    path = "/api/chat/widget",
    tag = "chat",
    request_body = ChatRequest,
    responses((status = 200, body = ChatResponse))
)]
pub async fn chat_widget_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    Ok(Json(answer(&state, &tenant, req).await?))
}

#[utoipa::path(
    post,
    path = "/api/chat/clear-history",
    tag = "chat",
    request_body = ClearHistoryRequest,
    responses((status = 200, body = ClearHistoryResponse))
)]
pub async fn clear_history_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
    Json(req): Json<ClearHistoryRequest>,
) -> ApiResult<Json<ClearHistoryResponse>> {
    state.session.clear(&tenant, &req.session_id).await;
    Ok(Json(ClearHistoryResponse { session_id: req.session_id, cleared: true }))
}

#[utoipa::path(
    get,
    path = "/api/chat/history",
    tag = "chat",
    params(HistoryQuery),
    responses((status = 200, body = HistoryResponse))
)]
pub async fn history_handler(
    TenantAuth(tenant): TenantAuth,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let turns = state
        .session
        .recent_turns(&tenant, &query.session_id, query.limit)
        .await
        .into_iter()
        .map(|turn| HistoryTurnDto { role: role_str(turn.role).to_string(), content: turn.content })
        .collect();

    Ok(Json(HistoryResponse { session_id: query.session_id, turns }))
}
