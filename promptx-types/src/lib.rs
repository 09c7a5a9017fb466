//! Wire types shared by `promptx-server` and `promptx-client`.
//!
//! Field names follow the camelCase JSON the browser client has always sent
//! (`conversationId`, `guestId`, `pinnedAt`, ...), so every struct here carries
//! `#[serde(rename_all = "camelCase")]`.

pub mod assistant;
pub mod auth;
pub mod chat;
pub mod conversation;
pub mod message;

pub use assistant::{AskMessage, AskRequest, AskResponse, SearchHit, SearchQuery, SearchResponse, SourceRef};
pub use auth::{
    GuestSessionResponse, LoginRequest, LoginResponse, MeResponse, Provider, SignupRequest,
    SignupResponse, SignupUser, UserProfile,
};
pub use chat::{ChatRequest, ChatResponse};
pub use conversation::{
    ConversationListResponse, ConversationSummary, CreateConversationRequest,
    CreateConversationResponse, DeleteConversationRequest, GuestQuery, PinConversationRequest,
    PinConversationResponse, PinnedState, RenameConversationRequest, DEFAULT_TITLE,
};
pub use message::{
    AttachmentKind, AttachmentMeta, CreateMessageRequest, CreateMessageResponse, MessageDto,
    MessageListResponse, MessagesQuery, Role,
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic `{ "success": true }` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const OK: SuccessResponse = SuccessResponse { success: true };
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    #[serde(default)]
    pub success: bool,
    pub error: String,
}
