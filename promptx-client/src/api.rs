//! The server's JSON API as seen from the client.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use promptx_types::{
    AttachmentMeta, ChatRequest, ChatResponse, ConversationListResponse, ConversationSummary,
    CreateConversationRequest, CreateConversationResponse, CreateMessageRequest, CreateMessageResponse,
    DeleteConversationRequest, ErrorBody, GuestSessionResponse, LoginRequest, LoginResponse, MeResponse,
    MessageDto, MessageListResponse, PinConversationRequest, PinConversationResponse, PinnedState,
    RenameConversationRequest, Role, SuccessResponse, UserProfile,
};
use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClientError, Result};

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Obtain a fresh signed guest credential.
    async fn issue_guest(&self) -> Result<String>;

    /// Returns the new (or, for a repeated idempotency key, the existing) id.
    async fn create_conversation(&self, title: Option<&str>, idempotency_key: Option<&str>) -> Result<String>;

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<()>;

    async fn pin_conversation(&self, id: &str, pin: bool) -> Result<PinnedState>;

    async fn delete_conversation(&self, id: &str) -> Result<()>;

    async fn create_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        attachments: Vec<AttachmentMeta>,
    ) -> Result<MessageDto>;

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<MessageDto>>;

    /// Enhance a prompt; returns the whole reply.
    async fn chat(&self, message: &str, files: Vec<AttachmentMeta>) -> Result<String>;

    /// Exchange credentials for a session token. Later requests act as that
    /// user instead of the guest.
    async fn login(&self, email: &str, password: &str) -> Result<String>;

    /// The logged-in account. Fails with 401 for guests.
    async fn me(&self) -> Result<UserProfile>;

    /// End the session and forget both the token and the guest credential.
    async fn logout(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct Identity {
    token: Option<String>,
    guest_id: Option<String>,
}

/// reqwest-backed [`ChatApi`].
///
/// Requests carry the `token` cookie when logged in and `guestId` otherwise,
/// never both.
#[derive(Debug)]
pub struct HttpChatApi {
    base_url: String,
    client: Client,
    identity: RwLock<Identity>,
}

impl HttpChatApi {
    /// `base_url` is the server origin, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("promptx-client/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            client,
            identity: RwLock::default(),
        })
    }

    pub fn set_token(&self, token: Option<String>) {
        self.identity.write().unwrap_or_else(PoisonError::into_inner).token = token;
    }

    pub fn set_guest_id(&self, guest_id: Option<String>) {
        self.identity.write().unwrap_or_else(PoisonError::into_inner).guest_id = guest_id;
    }

    /// Drop the session token and the guest credential.
    pub fn clear_identity(&self) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Identity::default();
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// The guest id to send, or `None` when a session token takes precedence.
    fn guest_id(&self) -> Option<String> {
        let identity = self.identity.read().unwrap_or_else(PoisonError::into_inner);
        match identity.token {
            Some(_) => None,
            None => identity.guest_id.clone(),
        }
    }

    fn with_session(&self, builder: RequestBuilder) -> RequestBuilder {
        let identity = self.identity.read().unwrap_or_else(PoisonError::into_inner);
        match &identity.token {
            Some(token) => builder.header(COOKIE, format!("token={token}")),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.with_session(builder).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| if body.is_empty() { status.to_string() } else { body });
        debug!(status = status.as_u16(), error = %message, "API request failed");
        Err(ClientError::Api { status: status.as_u16(), message })
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn issue_guest(&self) -> Result<String> {
        let body: GuestSessionResponse = self.send(self.client.post(self.url("/guest/session"))).await?;
        Ok(body.guest_id)
    }

    async fn create_conversation(&self, title: Option<&str>, idempotency_key: Option<&str>) -> Result<String> {
        let req = CreateConversationRequest {
            title: title.map(str::to_owned),
            guest_id: self.guest_id(),
            idempotency_key: idempotency_key.map(str::to_owned),
        };
        let body: CreateConversationResponse =
            self.send(self.client.post(self.url("/conversation/create")).json(&req)).await?;
        Ok(body.conversation_id)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let mut builder = self.client.get(self.url("/conversation/list"));
        if let Some(guest_id) = self.guest_id() {
            builder = builder.query(&[("guestId", guest_id)]);
        }
        let body: ConversationListResponse = self.send(builder).await?;
        Ok(body.conversations)
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        let req = RenameConversationRequest {
            conversation_id: id.to_owned(),
            title: title.to_owned(),
            guest_id: self.guest_id(),
        };
        let _: SuccessResponse = self.send(self.client.post(self.url("/conversation/rename")).json(&req)).await?;
        Ok(())
    }

    async fn pin_conversation(&self, id: &str, pin: bool) -> Result<PinnedState> {
        let req = PinConversationRequest { conversation_id: id.to_owned(), pin, guest_id: self.guest_id() };
        let body: PinConversationResponse =
            self.send(self.client.post(self.url("/conversation/pin")).json(&req)).await?;
        Ok(body.conversation)
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let req = DeleteConversationRequest { conversation_id: id.to_owned(), guest_id: self.guest_id() };
        let _: SuccessResponse = self.send(self.client.post(self.url("/conversation/delete")).json(&req)).await?;
        Ok(())
    }

    async fn create_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        attachments: Vec<AttachmentMeta>,
    ) -> Result<MessageDto> {
        let req = CreateMessageRequest {
            conversation_id: conversation_id.to_owned(),
            role: role.to_string(),
            content: content.to_owned(),
            attachments,
            guest_id: self.guest_id(),
        };
        let body: CreateMessageResponse = self.send(self.client.post(self.url("/message/create")).json(&req)).await?;
        Ok(body.message)
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<MessageDto>> {
        let mut query = vec![("conversationId", conversation_id.to_owned())];
        if let Some(guest_id) = self.guest_id() {
            query.push(("guestId", guest_id));
        }
        let body: MessageListResponse = self.send(self.client.get(self.url("/message/get")).query(&query)).await?;
        Ok(body.messages)
    }

    async fn chat(&self, message: &str, files: Vec<AttachmentMeta>) -> Result<String> {
        let req = ChatRequest { message: message.to_owned(), files };
        let body: ChatResponse = self.send(self.client.post(self.url("/chat")).json(&req)).await?;
        Ok(body.response)
    }

    async fn login(&self, email: &str, password: &str) -> Result<String> {
        let req = LoginRequest { email: email.to_owned(), password: password.to_owned() };
        let body: LoginResponse = self.send(self.client.post(self.url("/login")).json(&req)).await?;
        self.set_token(Some(body.token.clone()));
        Ok(body.token)
    }

    async fn me(&self) -> Result<UserProfile> {
        let body: MeResponse = self.send(self.client.get(self.url("/me"))).await?;
        Ok(body.user)
    }

    async fn logout(&self) -> Result<()> {
        let _: SuccessResponse = self.send(self.client.post(self.url("/logout"))).await?;
        self.clear_identity();
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_suppresses_guest_id() {
        let api = HttpChatApi::new("http://localhost:3000/").unwrap();
        assert_eq!(api.url("/chat"), "http://localhost:3000/api/chat");

        api.set_guest_id(Some("g1.sig".into()));
        assert_eq!(api.guest_id().as_deref(), Some("g1.sig"));

        api.set_token(Some("jwt".into()));
        assert_eq!(api.guest_id(), None);

        api.set_token(None);
        assert_eq!(api.guest_id().as_deref(), Some("g1.sig"));
    }

    #[test]
    fn clear_identity_forgets_token_and_guest() {
        let api = HttpChatApi::new("http://localhost:3000").unwrap();
        api.set_guest_id(Some("g1.sig".into()));
        api.set_token(Some("jwt".into()));

        api.clear_identity();
        assert_eq!(api.guest_id(), None);
        assert!(api.identity.read().unwrap().token.is_none());
    }
}
