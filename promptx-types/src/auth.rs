use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use validator::Validate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    #[default]
    Credentials,
    Google,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct SignupRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignupUser {
    pub id: String,
    pub username: Option<String>,
    pub email: String,
    pub joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub user: SignupUser,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
}

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub provider: Provider,
    pub avatar: Option<String>,
    pub is_verified: bool,
    pub is_admin: bool,
    pub joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserProfile,
}

/// A freshly issued, server-signed guest credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestSessionResponse {
    pub success: bool,
    pub guest_id: String,
}
