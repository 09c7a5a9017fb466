//! `GET /health`: liveness plus which optional collaborators are wired up.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;
use utoipa::{OpenApi, ToSchema};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthReport)))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// `"ok"`, or `"degraded"` when the database does not answer.
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    /// An API key for the completion service is present.
    pub completion: bool,
    pub google_sign_in: bool,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Serving", body = HealthReport),
        (status = 503, description = "Database unreachable", body = HealthReport),
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let database = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "health check: database ping failed");
            false
        }
    };
    let report = HealthReport {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        completion: state.gateway.is_configured(),
        google_sign_in: state.config.google.is_some(),
    };
    let code = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(report))
}
