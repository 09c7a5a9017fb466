//! Site assistant (`/ask`) and team directory search (`/search`).

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use promptx_types::{AskMessage, AskRequest, AskResponse, Role, SearchHit, SearchQuery, SearchResponse, SourceRef};
use tracing::warn;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::services::completion::{ChatTurn, CompletionRequest};
use crate::services::prompts::site_assistant_system;
use crate::services::retrieval::{best_docs, rank_docs, search_team};
use crate::services::site_knowledge::{FOLLOWUPS, SITE_DOCS, SiteDoc, TEAM};
use crate::state::AppState;

const HISTORY_MESSAGES: usize = 10;
const MESSAGE_CLIP_CHARS: usize = 1500;
const RANK_LIMIT: usize = 5;
/// `/ask` answer when the model returns no text.
pub const NO_ANSWER: &str = "Sorry — I couldn't generate an answer.";

#[derive(OpenApi)]
#[openapi(
    paths(ask, search),
    components(schemas(AskRequest, AskMessage, AskResponse, SourceRef, SearchResponse, SearchHit))
)]
pub struct AssistantApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ask", post(ask))
        .route("/search", get(search))
}

/// Last ten messages, each cut to 1500 characters.
fn recent_history(messages: &[AskMessage]) -> Vec<AskMessage> {
    let start = messages.len().saturating_sub(HISTORY_MESSAGES);
    messages[start..]
        .iter()
        .map(|m| AskMessage { role: m.role, content: m.content.chars().take(MESSAGE_CLIP_CHARS).collect() })
        .collect()
}

fn not_configured_answer(sources: &[SourceRef]) -> String {
    let pages: Vec<String> = sources.iter().map(|s| format!("- {} ({})", s.title, s.url)).collect();
    format!(
        "AI is not configured yet (missing API key). Set PROMPTX_LLM_API_KEY to enable answers.\n\n\
         For now, here are the most relevant pages:\n{}",
        pages.join("\n")
    )
}

#[utoipa::path(
    post,
    path = "/api/ask",
    tag = "assistant",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Answer grounded in site content", body = AskResponse),
        (status = 400, description = "Malformed conversation"),
        (status = 502, description = "Completion service failed twice"),
    )
)]
pub async fn ask(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<AskRequest>,
) -> Result<Json<AskResponse>, ServerError> {
    if req.messages.is_empty() || req.messages.iter().any(|m| m.content.is_empty()) {
        return Err(ServerError::Validation(
            "Invalid request body. Expected { messages: [{role, content}] }".to_owned(),
        ));
    }

    let history = recent_history(&req.messages);
    let last_user = history
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.trim())
        .unwrap_or_default();
    if last_user.is_empty() {
        return Err(ServerError::Validation("Missing user message.".to_owned()));
    }

    let ranked = rank_docs(last_user, SITE_DOCS, RANK_LIMIT);
    let docs: Vec<&SiteDoc> = best_docs(&ranked);
    let sources: Vec<SourceRef> = docs
        .iter()
        .map(|d| SourceRef { title: d.title.to_owned(), url: d.url.to_owned() })
        .collect();
    let followups: Vec<String> = FOLLOWUPS.iter().map(|f| (*f).to_owned()).collect();

    if !state.gateway.is_configured() {
        return Ok(Json(AskResponse { answer: not_configured_answer(&sources), sources, followups }));
    }

    let mut messages = vec![ChatTurn::system(site_assistant_system(&docs))];
    messages.extend(history.iter().map(|m| ChatTurn::from_role(m.role, m.content.clone())));
    let request = CompletionRequest { messages, temperature: Some(0.2), max_tokens: Some(600) };

    let answer = match state.gateway.complete(request.clone()).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!(error = %e, "site assistant completion failed; retrying once");
            state.gateway.complete(request).await?
        }
    };
    let answer = if answer.trim().is_empty() { NO_ANSWER.to_owned() } else { answer };

    Ok(Json(AskResponse { answer, sources, followups }))
}

#[utoipa::path(
    get,
    path = "/api/search",
    tag = "assistant",
    params(SearchQuery),
    responses((status = 200, description = "Matching team members", body = SearchResponse))
)]
pub async fn search(ApiQuery(query): ApiQuery<SearchQuery>) -> Json<SearchResponse> {
    let results = search_team(query.q.as_deref().unwrap_or_default(), TEAM);
    Json(SearchResponse { results })
}
