use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::cookie::session_token;
use super::token::Claims;
use crate::error::ServerError;
use crate::state::AppState;

/// The verified session user, if any. Extraction never fails: a missing,
/// malformed or expired token yields an anonymous value.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(Option<Claims>);

impl CurrentUser {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|c| c.sub.as_str())
    }

    /// For endpoints that require login.
    pub fn require(&self) -> Result<&Claims, ServerError> {
        self.0
            .as_ref()
            .ok_or_else(|| ServerError::Unauthorized("Unauthorized".to_owned()))
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self(Some(claims))
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let claims = session_token(&parts.headers).and_then(|token| state.auth.tokens.verify(&token));
        Ok(claims.map(Self::from).unwrap_or_default())
    }
}
