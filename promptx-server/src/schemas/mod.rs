//! Conversions from stored records to the wire types in `promptx-types`.

use promptx_types::{ConversationSummary, MessageDto, PinnedState, SignupUser, UserProfile};

use crate::entities::{ConversationRecord, MessageRecord, UserRecord};

impl ConversationRecord {
    pub fn to_summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            pinned_at: self.pinned_at,
        }
    }

    pub fn to_pinned_state(&self) -> PinnedState {
        PinnedState { id: self.id.clone(), pinned_at: self.pinned_at }
    }
}

impl MessageRecord {
    pub fn to_response(&self) -> MessageDto {
        MessageDto {
            id: self.id.clone(),
            conversation_id: self.conversation_id.clone(),
            role: self.role,
            content: self.content.clone(),
            attachments: self.attachments.clone(),
            created_at: self.created_at,
        }
    }
}

impl UserRecord {
    /// Public profile; the password hash never leaves the server.
    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            provider: self.provider,
            avatar: self.avatar.clone(),
            is_verified: self.is_verified,
            is_admin: self.is_admin,
            joined: self.joined,
        }
    }

    pub fn to_signup_user(&self) -> SignupUser {
        SignupUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            joined: self.joined,
        }
    }
}
