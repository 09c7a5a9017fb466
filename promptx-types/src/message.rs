use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::{IntoParams, ToSchema};

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    #[default]
    File,
}

/// Lightweight description of a file attached to a turn. The bytes never
/// reach the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub name: String,
    #[serde(default)]
    pub kind: AttachmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
    pub created_at: DateTime<Utc>,
}

/// `role` stays a string on the wire so an unknown value is reported as a
/// validation error instead of a deserialisation failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateMessageResponse {
    pub success: bool,
    pub message: MessageDto,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MessagesQuery {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub guest_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageListResponse {
    pub success: bool,
    pub messages: Vec<MessageDto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_parses_lowercase_only() {
        assert_eq!(Role::from_str("user").unwrap(), Role::User);
        assert_eq!(Role::from_str("assistant").unwrap(), Role::Assistant);
        assert!(Role::from_str("system").is_err());
        assert_eq!(Role::Assistant.as_ref(), "assistant");
    }

    #[test]
    fn attachment_kind_defaults_to_file() {
        let meta: AttachmentMeta = serde_json::from_str(r#"{"name":"notes.txt"}"#).unwrap();
        assert_eq!(meta.kind, AttachmentKind::File);
        assert_eq!(meta.size, None);
    }
}
