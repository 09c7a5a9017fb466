//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! Internal errors (Database, Internal) are logged with full detail but only a
//! generic message is returned, so SQL and file paths never reach clients.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use promptx_types::ErrorBody;
use thiserror::Error;
use tracing::{error, warn};

use crate::services::completion::GatewayError;

/// All errors that can occur in the promptx-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// No usable identity for an operation that needs one, or the identity
    /// does not own the record.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The completion service failed; the message is shown to the user.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A feature needs configuration that is absent (API key, OAuth client).
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServerError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Database(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let client_message = match self {
            ServerError::Validation(m)
            | ServerError::Unauthorized(m)
            | ServerError::NotFound(m)
            | ServerError::Conflict(m)
            | ServerError::NotConfigured(m) => m,
            ServerError::Upstream(m) => {
                warn!(message = %m, "completion gateway failed");
                m
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                "internal server error".to_owned()
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                "internal server error".to_owned()
            }
        };
        (status, Json(ErrorBody { success: false, error: client_message })).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .next()
            .unwrap_or_else(|| "invalid request".to_owned());
        ServerError::Validation(message)
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotConfigured => {
                ServerError::NotConfigured("completion service is not configured".to_owned())
            }
            other => ServerError::Upstream(other.to_string()),
        }
    }
}
