//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI document (disable with `PROMPTX_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - The JSON API under `/api`

mod api;
pub mod doc;
mod extract;
mod health;

use std::sync::Arc;

use axum::{Router, middleware};
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api::router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
