pub mod account;
pub mod assistant;
pub mod chat;
pub mod conversation;
pub mod guest;
pub mod message;
pub mod oauth;


use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(conversation::router())
        .merge(message::router())
        .merge(chat::router())
        .merge(guest::router())
        .merge(account::router())
        .merge(oauth::router())
        .merge(assistant::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut doc = Api::openapi();
    doc.merge(conversation::ConversationApi::openapi());
    doc.merge(message::MessageApi::openapi());
    doc.merge(chat::ChatApi::openapi());
    doc.merge(guest::GuestApi::openapi());
    doc.merge(account::AccountApi::openapi());
    doc.merge(oauth::OAuthApi::openapi());
    doc.merge(assistant::AssistantApi::openapi());

    doc
}
