//! Google sign-in.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use promptx_types::Provider;
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

use crate::auth::cookie::set_token;
use crate::auth::token::GOOGLE_TTL;
use crate::entities::{UserRecord, UserStore};
use crate::error::ServerError;
use crate::routes::extract::ApiQuery;
use crate::services::oauth::{GoogleProfile, derive_username};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(google_login, google_callback))]
pub struct OAuthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(google_login))
        .route("/auth/callback", get(google_callback))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

fn redirect_uri(state: &AppState) -> String {
    format!("{}/api/auth/callback", state.config.public_base_url)
}

#[utoipa::path(
    get,
    path = "/api/auth/google",
    tag = "accounts",
    responses(
        (status = 303, description = "Redirect to Google's consent screen"),
        (status = 503, description = "Google sign-in is not configured"),
    )
)]
pub async fn google_login(State(state): State<Arc<AppState>>) -> Result<Redirect, ServerError> {
    let url = state
        .oauth
        .authorize_url(&redirect_uri(&state))
        .ok_or_else(|| ServerError::NotConfigured("Google sign-in is not configured".to_owned()))?;
    Ok(Redirect::to(&url))
}

#[utoipa::path(
    get,
    path = "/api/auth/callback",
    tag = "accounts",
    params(CallbackQuery),
    responses((status = 303, description = "Redirect to the app, or to login with an error code"))
)]
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<CallbackQuery>,
) -> Response {
    let base = state.config.public_base_url.clone();
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Redirect::to(&format!("{base}/login?error=missing_code")).into_response();
    };

    match sign_in(&state, &code).await {
        Ok(token) => {
            let cookie = set_token(&token, GOOGLE_TTL, state.config.cookie_secure);
            (AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(&format!("{base}/Enhancer"))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Google sign-in failed");
            Redirect::to(&format!("{base}/login?error=google_failed")).into_response()
        }
    }
}

/// Exchange the code, find or create the account and issue a session token.
async fn sign_in(state: &AppState, code: &str) -> anyhow::Result<String> {
    let profile = state.oauth.exchange(code, &redirect_uri(state)).await?;
    let email = profile
        .email
        .clone()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Google returned no email"))?;

    let user = match state.store.find_user_by_email(&email).await? {
        Some(user) => {
            state
                .store
                .backfill_google_profile(&user.id, profile.id.as_deref(), profile.picture.as_deref())
                .await?;
            user
        }
        None => {
            let user = new_google_user(&profile, &email);
            state.store.insert_user(user.clone()).await?;
            info!(user_id = %user.id, "account created from Google profile");
            user
        }
    };

    Ok(state.auth.tokens.issue(&user.id, Some(&user.email), GOOGLE_TTL)?)
}

fn new_google_user(profile: &GoogleProfile, email: &str) -> UserRecord {
    UserRecord {
        id: Uuid::new_v4().to_string(),
        email: email.to_owned(),
        username: Some(derive_username(profile.name.as_deref(), email)),
        password_hash: None,
        provider: Provider::Google,
        google_id: profile.id.clone(),
        avatar: profile.picture.clone(),
        is_verified: true,
        is_admin: false,
        joined: Utc::now(),
    }
}
