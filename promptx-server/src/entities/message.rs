use std::future::Future;
use std::str::FromStr;

use promptx_types::{AttachmentMeta, Role};

use super::{MessageRecord, SqlStore, decode_err, format_ts, parse_ts};

pub trait MessageStore: Send + Sync + 'static {
    /// Append `msg` to its conversation. Returns `false` without writing when
    /// the conversation does not exist. Ownership is the caller's concern.
    fn append_message(&self, msg: MessageRecord) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Every message of the conversation in insertion order.
    fn list_messages(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, sqlx::Error>> + Send;
}

type MessageRow = (String, String, String, String, String, String);

impl MessageStore for SqlStore {
    async fn append_message(&self, msg: MessageRecord) -> Result<bool, sqlx::Error> {
        let attachments = serde_json::to_string(&msg.attachments).map_err(decode_err)?;
        let result = sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, attachments, created_at) \
             SELECT ?1, ?2, ?3, ?4, ?5, ?6 \
             WHERE EXISTS (SELECT 1 FROM conversations WHERE id = ?2)",
        )
        .bind(&msg.id)
        .bind(&msg.conversation_id)
        .bind(msg.role.as_ref())
        .bind(&msg.content)
        .bind(&attachments)
        .bind(format_ts(&msg.created_at))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, conversation_id, role, content, attachments, created_at \
             FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, seq ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, conversation_id, role, content, attachments, created_at)| {
                let attachments: Vec<AttachmentMeta> = serde_json::from_str(&attachments).map_err(decode_err)?;
                Ok(MessageRecord {
                    id,
                    conversation_id,
                    role: Role::from_str(&role).map_err(decode_err)?,
                    content,
                    attachments,
                    created_at: parse_ts(&created_at, "created_at"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ConversationRecord, ConversationStore, Owner, memory_store};
    use chrono::Utc;
    use promptx_types::AttachmentKind;
    use uuid::Uuid;

    async fn seeded() -> (SqlStore, String) {
        let store = memory_store().await;
        let id = Uuid::new_v4().to_string();
        store
            .create_conversation(ConversationRecord {
                id: id.clone(),
                title: "t".into(),
                owner: Owner::Guest("g".into()),
                pinned_at: None,
                idempotency_key: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        (store, id)
    }

    fn message(conversation_id: &str, role: Role, content: &str) -> MessageRecord {
        MessageRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_owned(),
            role,
            content: content.to_owned(),
            attachments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn list_preserves_insertion_order_even_with_equal_timestamps() {
        let (store, id) = seeded().await;
        let at = Utc::now();
        for n in 0..5 {
            let mut m = message(&id, if n % 2 == 0 { Role::User } else { Role::Assistant }, &format!("m{n}"));
            m.created_at = at;
            assert!(store.append_message(m).await.unwrap());
        }
        let contents: Vec<String> = store.list_messages(&id).await.unwrap().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_writes_nothing() {
        let (store, _) = seeded().await;
        assert!(!store.append_message(message("missing", Role::User, "hi")).await.unwrap());
        assert!(store.list_messages("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn attachments_survive_storage() {
        let (store, id) = seeded().await;
        let mut m = message(&id, Role::User, "see attached");
        m.attachments = vec![AttachmentMeta {
            name: "diagram.png".into(),
            kind: AttachmentKind::Image,
            mime_type: Some("image/png".into()),
            size: Some(2048),
        }];
        store.append_message(m.clone()).await.unwrap();
        let listed = store.list_messages(&id).await.unwrap();
        assert_eq!(listed[0].attachments, m.attachments);
    }

    #[tokio::test]
    async fn deleting_conversation_removes_its_messages() {
        let (store, id) = seeded().await;
        store.append_message(message(&id, Role::User, "hello")).await.unwrap();
        store.append_message(message(&id, Role::Assistant, "hi")).await.unwrap();
        assert!(store.delete_conversation(&id).await.unwrap());
        assert!(store.list_messages(&id).await.unwrap().is_empty());
    }
}
