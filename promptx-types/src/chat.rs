use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::message::AttachmentMeta;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<AttachmentMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
}
