use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use promptx_types::DEFAULT_TITLE;

use super::{ConversationRecord, Owner, OwnerKind, SqlStore, decode_err, format_ts, parse_ts};

/// Number of leading words of the first user message used as a title.
pub const AUTO_TITLE_WORDS: usize = 6;

/// Result of [`ConversationStore::create_conversation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub id: String,
    /// `false` when an existing record with the same idempotency key was returned.
    pub created: bool,
}

pub trait ConversationStore: Send + Sync + 'static {
    /// Insert `record`. When it carries an idempotency key already used by the
    /// same owner, the earlier record's id is returned instead.
    fn create_conversation(
        &self,
        record: ConversationRecord,
    ) -> impl Future<Output = Result<CreateOutcome, sqlx::Error>> + Send;

    fn get_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ConversationRecord>, sqlx::Error>> + Send;

    /// Pinned first (most recently pinned first), then newest first.
    fn list_conversations(
        &self,
        owner: &Owner,
    ) -> impl Future<Output = Result<Vec<ConversationRecord>, sqlx::Error>> + Send;

    fn rename_conversation(
        &self,
        id: &str,
        title: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    fn set_pinned(
        &self,
        id: &str,
        pinned_at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Removes the conversation and all of its messages atomically.
    fn delete_conversation(&self, id: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Replace a blank or default title with the first words of `content`.
    /// Returns the new title when a rewrite happened.
    fn auto_title(
        &self,
        id: &str,
        content: &str,
    ) -> impl Future<Output = Result<Option<String>, sqlx::Error>> + Send;
}

/// Title derived from a first user message, or `None` when it has no words.
pub fn title_from_message(content: &str) -> Option<String> {
    let words: Vec<&str> = content.split_whitespace().take(AUTO_TITLE_WORDS).collect();
    (!words.is_empty()).then(|| words.join(" "))
}

type ConversationRow = (String, String, String, String, Option<String>, Option<String>, String);

const SELECT_COLUMNS: &str =
    "SELECT id, title, owner_kind, owner_id, pinned_at, idempotency_key, created_at FROM conversations";

fn from_row(row: ConversationRow) -> Result<ConversationRecord, sqlx::Error> {
    let (id, title, owner_kind, owner_id, pinned_at, idempotency_key, created_at) = row;
    let kind = OwnerKind::from_str(&owner_kind).map_err(decode_err)?;
    Ok(ConversationRecord {
        id,
        title,
        owner: Owner::from_parts(kind, owner_id),
        pinned_at: pinned_at.as_deref().map(|raw| parse_ts(raw, "pinned_at")),
        idempotency_key,
        created_at: parse_ts(&created_at, "created_at"),
    })
}

impl ConversationStore for SqlStore {
    async fn create_conversation(&self, record: ConversationRecord) -> Result<CreateOutcome, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO conversations \
             (id, title, owner_kind, owner_id, pinned_at, idempotency_key, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(record.owner.kind().as_ref())
        .bind(record.owner.id())
        .bind(record.pinned_at.as_ref().map(format_ts))
        .bind(&record.idempotency_key)
        .bind(format_ts(&record.created_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(CreateOutcome { id: record.id, created: true });
        }

        let Some(key) = record.idempotency_key.as_deref() else {
            return Err(sqlx::Error::RowNotFound);
        };
        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM conversations \
             WHERE owner_kind = ?1 AND owner_id = ?2 AND idempotency_key = ?3",
        )
        .bind(record.owner.kind().as_ref())
        .bind(record.owner.id())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some((id,)) => Ok(CreateOutcome { id, created: false }),
            None => Err(sqlx::Error::RowNotFound),
        }
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<ConversationRecord>, sqlx::Error> {
        let row: Option<ConversationRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(from_row).transpose()
    }

    async fn list_conversations(&self, owner: &Owner) -> Result<Vec<ConversationRecord>, sqlx::Error> {
        let rows: Vec<ConversationRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE owner_kind = ?1 AND owner_id = ?2 \
             ORDER BY (pinned_at IS NULL) ASC, pinned_at DESC, created_at DESC, rowid DESC"
        ))
        .bind(owner.kind().as_ref())
        .bind(owner.id())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE conversations SET title = ?1 WHERE id = ?2")
            .bind(title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_pinned(&self, id: &str, pinned_at: Option<DateTime<Utc>>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE conversations SET pinned_at = ?1 WHERE id = ?2")
            .bind(pinned_at.as_ref().map(format_ts))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let messages = sqlx::query("DELETE FROM messages WHERE conversation_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let conversation = sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(
            conversation_id = %id,
            messages = messages.rows_affected(),
            "conversation deleted"
        );
        Ok(conversation.rows_affected() > 0)
    }

    async fn auto_title(&self, id: &str, content: &str) -> Result<Option<String>, sqlx::Error> {
        let Some(title) = title_from_message(content) else {
            return Ok(None);
        };
        let result = sqlx::query(
            "UPDATE conversations SET title = ?1 \
             WHERE id = ?2 AND (trim(title) = '' OR title = ?3)",
        )
        .bind(&title)
        .bind(id)
        .bind(DEFAULT_TITLE)
        .execute(&self.pool)
        .await?;
        Ok((result.rows_affected() > 0).then_some(title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::memory_store;
    use chrono::Duration;
    use uuid::Uuid;

    fn record(owner: Owner, title: &str, created_at: DateTime<Utc>) -> ConversationRecord {
        ConversationRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_owned(),
            owner,
            pinned_at: None,
            idempotency_key: None,
            created_at,
        }
    }

    #[test]
    fn title_takes_first_six_words() {
        assert_eq!(
            title_from_message("Write me a haiku about the sea").as_deref(),
            Some("Write me a haiku about the")
        );
        assert_eq!(title_from_message("  short\tprompt \n").as_deref(), Some("short prompt"));
        assert_eq!(title_from_message("   "), None);
    }

    #[tokio::test]
    async fn list_puts_pinned_first_by_pin_time() {
        let store = memory_store().await;
        let owner = Owner::Guest("g1".into());
        let base = Utc::now();

        let oldest = record(owner.clone(), "oldest", base);
        let middle = record(owner.clone(), "middle", base + Duration::seconds(1));
        let newest = record(owner.clone(), "newest", base + Duration::seconds(2));
        for r in [&oldest, &middle, &newest] {
            store.create_conversation(r.clone()).await.unwrap();
        }
        store.set_pinned(&oldest.id, Some(base + Duration::seconds(10))).await.unwrap();
        store.set_pinned(&middle.id, Some(base + Duration::seconds(20))).await.unwrap();

        let titles: Vec<String> =
            store.list_conversations(&owner).await.unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["middle", "oldest", "newest"]);
    }

    #[tokio::test]
    async fn list_is_scoped_to_owner_kind_and_id() {
        let store = memory_store().await;
        let now = Utc::now();
        store.create_conversation(record(Owner::Guest("same".into()), "guest", now)).await.unwrap();
        store.create_conversation(record(Owner::User("same".into()), "user", now)).await.unwrap();

        let guest = store.list_conversations(&Owner::Guest("same".into())).await.unwrap();
        assert_eq!(guest.len(), 1);
        assert_eq!(guest[0].title, "guest");
        assert_eq!(guest[0].owner, Owner::Guest("same".into()));
    }

    #[tokio::test]
    async fn idempotency_key_returns_existing_record() {
        let store = memory_store().await;
        let owner = Owner::User("u1".into());
        let mut first = record(owner.clone(), DEFAULT_TITLE, Utc::now());
        first.idempotency_key = Some("k1".into());
        let mut retry = record(owner.clone(), DEFAULT_TITLE, Utc::now());
        retry.idempotency_key = Some("k1".into());

        let a = store.create_conversation(first.clone()).await.unwrap();
        let b = store.create_conversation(retry).await.unwrap();
        assert!(a.created);
        assert!(!b.created);
        assert_eq!(a.id, b.id);
        assert_eq!(store.list_conversations(&owner).await.unwrap().len(), 1);

        // Same key, different owner: independent.
        let mut other = record(Owner::User("u2".into()), DEFAULT_TITLE, Utc::now());
        other.idempotency_key = Some("k1".into());
        assert!(store.create_conversation(other).await.unwrap().created);
    }

    #[tokio::test]
    async fn auto_title_only_rewrites_default_titles() {
        let store = memory_store().await;
        let conv = record(Owner::Guest("g".into()), DEFAULT_TITLE, Utc::now());
        store.create_conversation(conv.clone()).await.unwrap();

        let first = store.auto_title(&conv.id, "Write me a haiku about the sea").await.unwrap();
        assert_eq!(first.as_deref(), Some("Write me a haiku about the"));
        let second = store.auto_title(&conv.id, "Something else entirely now please").await.unwrap();
        assert_eq!(second, None);

        let stored = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Write me a haiku about the");
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let store = memory_store().await;
        let conv = record(Owner::Guest("g".into()), "t", Utc::now());
        store.create_conversation(conv.clone()).await.unwrap();
        assert!(store.delete_conversation(&conv.id).await.unwrap());
        assert!(!store.delete_conversation(&conv.id).await.unwrap());
        assert!(store.get_conversation(&conv.id).await.unwrap().is_none());
    }
}
