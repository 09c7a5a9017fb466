use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use promptx_types::GuestSessionResponse;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(issue_guest_session), components(schemas(GuestSessionResponse)))]
pub struct GuestApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/guest/session", post(issue_guest_session))
}

/// Mint a signed guest credential to send as `guestId`.
#[utoipa::path(
    post,
    path = "/api/guest/session",
    tag = "identity",
    responses((status = 200, description = "New guest credential", body = GuestSessionResponse))
)]
pub async fn issue_guest_session(State(state): State<Arc<AppState>>) -> Json<GuestSessionResponse> {
    Json(GuestSessionResponse { success: true, guest_id: state.auth.guests.issue() })
}
