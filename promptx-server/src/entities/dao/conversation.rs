use chrono::{DateTime, Utc};
use strum::{AsRefStr, EnumString};

/// Who a conversation belongs to. Exactly one variant, so a record can never
/// be owned by both a user and a guest, or by nobody.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    User(String),
    Guest(String),
}

/// `owner_kind` column values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum OwnerKind {
    User,
    Guest,
}

impl Owner {
    pub fn kind(&self) -> OwnerKind {
        match self {
            Owner::User(_) => OwnerKind::User,
            Owner::Guest(_) => OwnerKind::Guest,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Owner::User(id) | Owner::Guest(id) => id,
        }
    }

    pub fn from_parts(kind: OwnerKind, id: String) -> Self {
        match kind {
            OwnerKind::User => Owner::User(id),
            OwnerKind::Guest => Owner::Guest(id),
        }
    }
}

/// A single row in the `conversations` table.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    pub owner: Owner,
    /// Non-null means pinned.
    pub pinned_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
