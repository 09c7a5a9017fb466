use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Wildcard CORS unless `PROMPTX_CORS_ORIGINS` lists origins. A restricted
/// layer allows credentials so the `token` cookie crosses origins.
pub fn cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods(Any);
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_credentials(true)
}
