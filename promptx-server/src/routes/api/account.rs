//! Credential accounts: signup, login, logout and the current profile.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use promptx_types::{
    LoginRequest, LoginResponse, MeResponse, Provider, SignupRequest, SignupResponse, SignupUser, SuccessResponse,
    UserProfile,
};
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::auth::cookie::{clear_token, set_token};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::CREDENTIALS_TTL;
use crate::entities::{UserRecord, UserStore};
use crate::error::ServerError;
use crate::routes::extract::ApiJson;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(signup, login, logout, me),
    components(schemas(
        SignupRequest,
        SignupResponse,
        SignupUser,
        LoginRequest,
        LoginResponse,
        MeResponse,
        UserProfile,
        Provider
    ))
)]
pub struct AccountApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

fn blocking_error(e: tokio::task::JoinError) -> ServerError {
    ServerError::Internal(format!("password task failed: {e}"))
}

#[utoipa::path(
    post,
    path = "/api/signup",
    tag = "accounts",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created", body = SignupResponse),
        (status = 400, description = "Missing or invalid field"),
        (status = 409, description = "Email already registered"),
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<Json<SignupResponse>, ServerError> {
    req.validate()?;

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(blocking_error)??;

    let user = UserRecord {
        id: Uuid::new_v4().to_string(),
        email: req.email.trim().to_owned(),
        username: Some(req.username.trim().to_owned()),
        password_hash: Some(password_hash),
        provider: Provider::Credentials,
        google_id: None,
        avatar: None,
        is_verified: false,
        is_admin: false,
        joined: Utc::now(),
    };

    match state.store.insert_user(user.clone()).await {
        Ok(()) => {}
        Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
            return Err(ServerError::Conflict("User already exists".to_owned()));
        }
        Err(e) => return Err(e.into()),
    }
    info!(user_id = %user.id, "account created");

    Ok(Json(SignupResponse {
        success: true,
        message: "User created successfully".to_owned(),
        user: user.to_signup_user(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/login",
    tag = "accounts",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; sets the `token` cookie", body = LoginResponse),
        (status = 400, description = "Missing field or wrong password"),
        (status = 404, description = "Unknown email"),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ServerError> {
    req.validate()?;

    let user = state
        .store
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or_else(|| ServerError::NotFound("User not found".to_owned()))?;

    let stored_hash = user.password_hash.clone().unwrap_or_default();
    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(blocking_error)?;
    if !matches {
        return Err(ServerError::Validation("Invalid password".to_owned()));
    }

    let token = state
        .auth
        .tokens
        .issue(&user.id, Some(&user.email), CREDENTIALS_TTL)
        .map_err(|e| ServerError::Internal(format!("token signing failed: {e}")))?;
    info!(user_id = %user.id, "login succeeded");

    let cookie = set_token(&token, CREDENTIALS_TTL, state.config.cookie_secure);
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(LoginResponse { success: true, message: "Login successful".to_owned(), token }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "accounts",
    responses((status = 200, description = "Cookie cleared", body = SuccessResponse))
)]
pub async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, clear_token(state.config.cookie_secure))]),
        Json(SuccessResponse::OK),
    )
}

#[utoipa::path(
    get,
    path = "/api/me",
    tag = "accounts",
    responses(
        (status = 200, description = "Current account", body = MeResponse),
        (status = 401, description = "Not logged in"),
    )
)]
pub async fn me(State(state): State<Arc<AppState>>, user: CurrentUser) -> Result<Json<MeResponse>, ServerError> {
    let claims = user.require()?;
    let user = state
        .store
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| ServerError::Unauthorized("Unauthorized".to_owned()))?;
    Ok(Json(MeResponse { success: true, user: user.to_profile() }))
}
