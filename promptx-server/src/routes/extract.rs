//! Extractors whose rejections use the JSON error body.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ServerError;

/// `axum::Json` with malformed bodies reported as `400 {"success":false,...}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with the same error mapping.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServerError))]
pub struct ApiQuery<T>(pub T);
