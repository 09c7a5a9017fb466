use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use promptx_types::{
    ConversationListResponse, ConversationSummary, CreateConversationRequest, CreateConversationResponse,
    DEFAULT_TITLE, DeleteConversationRequest, GuestQuery, PinConversationRequest, PinConversationResponse,
    PinnedState, RenameConversationRequest, SuccessResponse,
};
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::auth::{Access, CurrentUser, Principal, authorize};
use crate::entities::{ConversationRecord, ConversationStore, SqlStore};
use crate::error::ServerError;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_conversation, list_conversations, rename_conversation, update_title, pin_conversation, delete_conversation),
    components(schemas(
        CreateConversationRequest,
        CreateConversationResponse,
        ConversationListResponse,
        ConversationSummary,
        RenameConversationRequest,
        PinConversationRequest,
        PinConversationResponse,
        PinnedState,
        DeleteConversationRequest,
        SuccessResponse
    ))
)]
pub struct ConversationApi;

/// Register conversation routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversation/create", post(create_conversation))
        .route("/conversation/list", get(list_conversations))
        .route("/conversation/rename", post(rename_conversation))
        .route("/conversation/update-title", post(update_title))
        .route("/conversation/pin", post(pin_conversation))
        .route("/conversation/delete", post(delete_conversation))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Load `id` and run the ownership guard, keeping 404 and 401 distinct.
pub(super) async fn authorized_conversation(
    store: &SqlStore,
    id: &str,
    principal: &Principal,
) -> Result<ConversationRecord, ServerError> {
    let conversation = store.get_conversation(id).await?;
    match (authorize(conversation.as_ref(), principal), conversation) {
        (Access::Authorized, Some(conversation)) => Ok(conversation),
        (Access::Unauthorized, _) => Err(ServerError::Unauthorized("Unauthorized".to_owned())),
        _ => Err(ServerError::NotFound("Conversation not found".to_owned())),
    }
}

// ── Conversation handlers ─────────────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/api/conversation/create",
    tag = "conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 200, description = "Conversation created or reused", body = CreateConversationResponse),
        (status = 400, description = "No user token and no valid guest credential"),
    )
)]
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateConversationRequest>,
) -> Result<Json<CreateConversationResponse>, ServerError> {
    let principal = Principal::resolve(&user, req.guest_id.as_deref(), &state.auth);
    let owner = principal
        .owner()
        .ok_or_else(|| ServerError::Validation("Missing guestId or login token".to_owned()))?;

    let record = ConversationRecord {
        id: Uuid::new_v4().to_string(),
        title: non_blank(req.title.as_deref()).unwrap_or(DEFAULT_TITLE).to_owned(),
        owner,
        pinned_at: None,
        idempotency_key: non_blank(req.idempotency_key.as_deref()).map(str::to_owned),
        created_at: Utc::now(),
    };
    let outcome = state.store.create_conversation(record).await?;
    info!(conversation_id = %outcome.id, created = outcome.created, "conversation create");

    Ok(Json(CreateConversationResponse {
        success: true,
        conversation_id: outcome.id,
        created: outcome.created,
    }))
}

#[utoipa::path(
    get,
    path = "/api/conversation/list",
    tag = "conversations",
    params(GuestQuery),
    responses(
        (status = 200, description = "Conversations, pinned first", body = ConversationListResponse),
        (status = 401, description = "No identity"),
    )
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<GuestQuery>,
) -> Result<Json<ConversationListResponse>, ServerError> {
    let principal = Principal::resolve(&user, query.guest_id.as_deref(), &state.auth);
    let owner = principal
        .owner()
        .ok_or_else(|| ServerError::Unauthorized("Unauthorized".to_owned()))?;

    let conversations = state.store.list_conversations(&owner).await?;
    Ok(Json(ConversationListResponse {
        success: true,
        conversations: conversations.iter().map(ConversationRecord::to_summary).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/conversation/rename",
    tag = "conversations",
    request_body = RenameConversationRequest,
    responses(
        (status = 200, description = "Renamed", body = SuccessResponse),
        (status = 400, description = "Missing id or blank title"),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "No such conversation"),
    )
)]
pub async fn rename_conversation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<RenameConversationRequest>,
) -> Result<Json<SuccessResponse>, ServerError> {
    let id = non_blank(Some(req.conversation_id.as_str()));
    let title = non_blank(Some(req.title.as_str()));
    let (Some(id), Some(title)) = (id, title) else {
        return Err(ServerError::Validation("Missing conversationId or title".to_owned()));
    };
    let principal = Principal::resolve(&user, req.guest_id.as_deref(), &state.auth);
    let conversation = authorized_conversation(&state.store, id, &principal).await?;

    if !state.store.rename_conversation(&conversation.id, title).await? {
        return Err(ServerError::NotFound("Conversation not found".to_owned()));
    }
    info!(conversation_id = %conversation.id, "conversation renamed");
    Ok(Json(SuccessResponse::OK))
}

/// Older clients call this path; it behaves exactly like rename.
#[utoipa::path(
    post,
    path = "/api/conversation/update-title",
    tag = "conversations",
    request_body = RenameConversationRequest,
    responses(
        (status = 200, description = "Renamed", body = SuccessResponse),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "No such conversation"),
    )
)]
pub async fn update_title(
    state: State<Arc<AppState>>,
    user: CurrentUser,
    req: ApiJson<RenameConversationRequest>,
) -> Result<Json<SuccessResponse>, ServerError> {
    rename_conversation(state, user, req).await
}

#[utoipa::path(
    post,
    path = "/api/conversation/pin",
    tag = "conversations",
    request_body = PinConversationRequest,
    responses(
        (status = 200, description = "Pin state updated", body = PinConversationResponse),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "No such conversation"),
    )
)]
pub async fn pin_conversation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<PinConversationRequest>,
) -> Result<Json<PinConversationResponse>, ServerError> {
    let id = non_blank(Some(req.conversation_id.as_str()))
        .ok_or_else(|| ServerError::Validation("Missing conversationId".to_owned()))?;
    let principal = Principal::resolve(&user, req.guest_id.as_deref(), &state.auth);
    let mut conversation = authorized_conversation(&state.store, id, &principal).await?;

    conversation.pinned_at = req.pin.then(Utc::now);
    if !state.store.set_pinned(&conversation.id, conversation.pinned_at).await? {
        return Err(ServerError::NotFound("Conversation not found".to_owned()));
    }
    info!(conversation_id = %conversation.id, pinned = req.pin, "conversation pin updated");

    Ok(Json(PinConversationResponse { success: true, conversation: conversation.to_pinned_state() }))
}

#[utoipa::path(
    post,
    path = "/api/conversation/delete",
    tag = "conversations",
    request_body = DeleteConversationRequest,
    responses(
        (status = 200, description = "Conversation and its messages deleted", body = SuccessResponse),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "No such conversation"),
    )
)]
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<DeleteConversationRequest>,
) -> Result<Json<SuccessResponse>, ServerError> {
    let id = non_blank(Some(req.conversation_id.as_str()))
        .ok_or_else(|| ServerError::Validation("Missing conversationId".to_owned()))?;
    let principal = Principal::resolve(&user, req.guest_id.as_deref(), &state.auth);
    let conversation = authorized_conversation(&state.store, id, &principal).await?;

    if !state.store.delete_conversation(&conversation.id).await? {
        return Err(ServerError::NotFound("Conversation not found".to_owned()));
    }
    info!(conversation_id = %conversation.id, "conversation deleted");
    Ok(Json(SuccessResponse::OK))
}
