use chrono::{DateTime, Utc};
use promptx_types::{AttachmentMeta, Role};

/// A single row in the `messages` table.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub attachments: Vec<AttachmentMeta>,
    pub created_at: DateTime<Utc>,
}
