use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use promptx_types::{ChatRequest, ChatResponse};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::routes::extract::ApiJson;
use crate::services::completion::{ChatTurn, CompletionRequest, EMPTY_COMPLETION};
use crate::services::prompts::{PROMPT_ENHANCER, enhancer_user_turn};
use crate::state::AppState;

/// Longest prompt accepted by `/chat`, in bytes.
pub const MAX_PROMPT_BYTES: usize = 128 * 1024;

#[derive(OpenApi)]
#[openapi(paths(chat), components(schemas(ChatRequest, ChatResponse)))]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

/// Enhance a prompt.
///
/// The reply is returned whole; any progressive reveal is up to the client.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Enhanced prompt", body = ChatResponse),
        (status = 400, description = "Empty or oversized prompt"),
        (status = 502, description = "Completion service failed; `error` holds the reason"),
        (status = 503, description = "No API key configured"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    if req.message.trim().is_empty() {
        return Err(ServerError::Validation("Message is required".to_owned()));
    }
    if req.message.len() > MAX_PROMPT_BYTES {
        return Err(ServerError::Validation(format!(
            "Message exceeds {} KiB",
            MAX_PROMPT_BYTES / 1024
        )));
    }

    let request = CompletionRequest {
        messages: vec![
            ChatTurn::system(PROMPT_ENHANCER),
            ChatTurn::user(enhancer_user_turn(&req.message, &req.files)),
        ],
        ..CompletionRequest::default()
    };
    let mut response = state.gateway.complete(request).await?;
    if response.trim().is_empty() {
        response = EMPTY_COMPLETION.to_owned();
    }
    info!(prompt_bytes = req.message.len(), files = req.files.len(), "prompt enhanced");

    Ok(Json(ChatResponse { response }))
}
