use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use promptx_types::{
    AttachmentMeta, CreateMessageRequest, CreateMessageResponse, MessageDto, MessageListResponse, MessagesQuery,
    Role,
};
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

use super::conversation::authorized_conversation;
use crate::auth::{CurrentUser, Principal};
use crate::entities::{ConversationStore, MessageRecord, MessageStore};
use crate::error::ServerError;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_message, get_messages),
    components(schemas(CreateMessageRequest, CreateMessageResponse, MessageListResponse, MessageDto, AttachmentMeta, Role))
)]
pub struct MessageApi;

/// Register message routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/message/create", post(create_message))
        .route("/message/get", get(get_messages))
}

#[utoipa::path(
    post,
    path = "/api/message/create",
    tag = "messages",
    request_body = CreateMessageRequest,
    responses(
        (status = 200, description = "Message stored", body = CreateMessageResponse),
        (status = 400, description = "Missing field, unknown role or unknown conversation"),
        (status = 401, description = "Not the conversation owner"),
        (status = 404, description = "No such conversation"),
    )
)]
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateMessageRequest>,
) -> Result<Json<CreateMessageResponse>, ServerError> {
    let conversation_id = req.conversation_id.trim();
    if conversation_id.is_empty() || req.role.trim().is_empty() || req.content.trim().is_empty() {
        return Err(ServerError::Validation("Missing required fields".to_owned()));
    }
    let role = Role::from_str(req.role.trim())
        .map_err(|_| ServerError::Validation(format!("Invalid role: {}", req.role.trim())))?;

    let principal = Principal::resolve(&user, req.guest_id.as_deref(), &state.auth);
    let conversation = authorized_conversation(&state.store, conversation_id, &principal).await?;

    let record = MessageRecord {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation.id.clone(),
        role,
        content: req.content,
        attachments: req.attachments,
        created_at: Utc::now(),
    };
    if !state.store.append_message(record.clone()).await? {
        return Err(ServerError::Validation("Conversation does not exist".to_owned()));
    }

    if role == Role::User {
        if let Some(title) = state.store.auto_title(&conversation.id, &record.content).await? {
            info!(conversation_id = %conversation.id, title = %title, "conversation auto-titled");
        }
    }

    Ok(Json(CreateMessageResponse { success: true, message: record.to_response() }))
}

#[utoipa::path(
    get,
    path = "/api/message/get",
    tag = "messages",
    params(MessagesQuery),
    responses(
        (status = 200, description = "Messages in insertion order", body = MessageListResponse),
        (status = 400, description = "Missing conversationId"),
        (status = 401, description = "Not the conversation owner"),
        (status = 404, description = "No such conversation"),
    )
)]
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<MessagesQuery>,
) -> Result<Json<MessageListResponse>, ServerError> {
    let conversation_id = query
        .conversation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServerError::Validation("conversationId is required".to_owned()))?;

    let principal = Principal::resolve(&user, query.guest_id.as_deref(), &state.auth);
    let conversation = authorized_conversation(&state.store, conversation_id, &principal).await?;

    let messages = state.store.list_messages(&conversation.id).await?;
    Ok(Json(MessageListResponse {
        success: true,
        messages: messages.iter().map(MessageRecord::to_response).collect(),
    }))
}
