use std::future::Future;
use std::str::FromStr;

use promptx_types::Provider;

use super::{SqlStore, UserRecord, decode_err, format_ts, parse_ts};

pub trait UserStore: Send + Sync + 'static {
    /// Fails with a unique violation when the email is taken.
    fn insert_user(&self, user: UserRecord) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn get_user(&self, id: &str) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;

    /// Fill `google_id` / `avatar` where they are still empty.
    fn backfill_google_profile(
        &self,
        id: &str,
        google_id: Option<&str>,
        avatar: Option<&str>,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

type UserRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    bool,
    bool,
    String,
);

const SELECT_COLUMNS: &str = "SELECT id, email, username, password_hash, provider, google_id, avatar, \
     is_verified, is_admin, joined FROM users";

fn from_row(row: UserRow) -> Result<UserRecord, sqlx::Error> {
    let (id, email, username, password_hash, provider, google_id, avatar, is_verified, is_admin, joined) = row;
    Ok(UserRecord {
        id,
        email,
        username,
        password_hash,
        provider: Provider::from_str(&provider).map_err(decode_err)?,
        google_id,
        avatar,
        is_verified,
        is_admin,
        joined: parse_ts(&joined, "joined"),
    })
}

impl UserStore for SqlStore {
    async fn insert_user(&self, user: UserRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, provider, google_id, avatar, \
             is_verified, is_admin, joined) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.provider.as_ref())
        .bind(&user.google_id)
        .bind(&user.avatar)
        .bind(user.is_verified)
        .bind(user.is_admin)
        .bind(format_ts(&user.joined))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE email = ?1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(from_row).transpose()
    }

    async fn backfill_google_profile(
        &self,
        id: &str,
        google_id: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET google_id = COALESCE(google_id, ?1), avatar = COALESCE(avatar, ?2) \
             WHERE id = ?3",
        )
        .bind(google_id)
        .bind(avatar)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
