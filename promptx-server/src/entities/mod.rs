//! Persistence layer.
//!
//! One store trait per aggregate ([`ConversationStore`], [`MessageStore`],
//! [`UserStore`]), all implemented by [`SqlStore`]. Trait methods use
//! `impl Future` in their signatures, so handlers stay generic over the
//! backing database without `async-trait`.
//!
//! Timestamps are stored as RFC 3339 text with a fixed microsecond precision
//! and a `Z` suffix, so lexicographic order in SQL equals time order.

pub mod conversation;
pub mod dao;
pub mod message;
pub mod user;

pub use conversation::{ConversationStore, CreateOutcome};
pub use dao::{ConversationRecord, MessageRecord, Owner, OwnerKind, UserRecord};
pub use message::MessageStore;
pub use user::UserStore;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

#[derive(Clone, Debug)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://promptx.db?mode=rwc"` or
    /// `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is a separate database, so tests
        // pin the pool to one connection that never expires.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str, column: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, column, error = %e, "failed to parse timestamp; using now");
        Utc::now()
    })
}

fn decode_err<E>(e: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(e))
}

#[cfg(test)]
#[cfg(test)]
pub(crate) async fn memory_store() -> SqlStore {
    SqlStore::connect("sqlite::memory:").await.unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        assert!(format_ts(&early) < format_ts(&late));
        assert_eq!(parse_ts(&format_ts(&late), "created_at"), late);
    }
}
