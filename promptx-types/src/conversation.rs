use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Title given to a conversation created without one.
pub const DEFAULT_TITLE: &str = "New Chat";

/// One entry of the history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub pinned_at: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    pub fn is_pinned(&self) -> bool {
        self.pinned_at.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
    /// Client-chosen key that makes a retried create return the same record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationResponse {
    pub success: bool,
    pub conversation_id: String,
    /// `false` when an earlier create with the same idempotency key was reused.
    #[serde(default = "default_true")]
    pub created: bool,
}

fn default_true() -> bool {
    true
}

/// `?guestId=` query used by the read endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct GuestQuery {
    #[serde(default)]
    pub guest_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListResponse {
    pub success: bool,
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameConversationRequest {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PinConversationRequest {
    #[serde(default)]
    pub conversation_id: String,
    pub pin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PinnedState {
    pub id: String,
    pub pinned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PinConversationResponse {
    pub success: bool,
    pub conversation: PinnedState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConversationRequest {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_uses_camel_case_and_accepts_missing_pin() {
        let json = r#"{"id":"c1","title":"t","createdAt":"2026-01-01T00:00:00Z"}"#;
        let summary: ConversationSummary = serde_json::from_str(json).unwrap();
        assert!(!summary.is_pinned());

        let out = serde_json::to_value(&summary).unwrap();
        assert!(out.get("createdAt").is_some());
        assert!(out.get("pinnedAt").is_some());
    }

    #[test]
    fn create_request_omits_absent_fields() {
        let body = serde_json::to_value(CreateConversationRequest::default()).unwrap();
        assert_eq!(body, serde_json::json!({}));
    }
}
