use chrono::{DateTime, Utc};
use promptx_types::Provider;

/// A single row in the `users` table.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    /// Argon2 PHC string; `None` for Google-only accounts.
    pub password_hash: Option<String>,
    pub provider: Provider,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub is_verified: bool,
    pub is_admin: bool,
    pub joined: DateTime<Utc>,
}
