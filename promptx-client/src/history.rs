//! Sidebar conversation list.
//!
//! The list is refetched after every successful mutation. Rename and delete
//! mutate locally first and roll back if the server refuses; pin does the same
//! and then forces a refetch so the order matches the server's.
//!
//! Search is client-side only: a case-insensitive substring match over titles
//! and the text of conversations whose messages have been fetched (on hover,
//! on open, or via [`HistoryPanel::preload_search`]).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use promptx_types::{ConversationSummary, MessageDto};
use tracing::{debug, warn};

use crate::api::ChatApi;
use crate::error::{ClientError, Result};
use crate::optimistic::optimistic;
use crate::session::ChatSession;

/// Entries shown in the "recent" section.
pub const LATEST_LIMIT: usize = 11;

/// Messages kept per conversation for hover previews.
pub const PREVIEW_MESSAGES: usize = 3;

/// Pinned first (most recently pinned on top), then newest first.
pub fn sort_conversations(list: &mut [ConversationSummary]) {
    list.sort_by(|a, b| match (a.pinned_at, b.pinned_at) {
        (Some(pa), Some(pb)) => pb.cmp(&pa).then_with(|| b.created_at.cmp(&a.created_at)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.created_at.cmp(&a.created_at),
    });
}

pub struct HistoryPanel {
    api: Arc<dyn ChatApi>,
    session: Arc<ChatSession>,
    conversations: Vec<ConversationSummary>,
    previews: HashMap<String, Vec<MessageDto>>,
    search_text: HashMap<String, String>,
}

impl HistoryPanel {
    pub fn new(api: Arc<dyn ChatApi>, session: Arc<ChatSession>) -> Self {
        Self { api, session, conversations: Vec::new(), previews: HashMap::new(), search_text: HashMap::new() }
    }

    /// Sorted list as of the last refresh or local mutation.
    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn latest(&self) -> &[ConversationSummary] {
        &self.conversations[..self.conversations.len().min(LATEST_LIMIT)]
    }

    pub async fn refresh(&mut self) -> Result<()> {
        let mut list = self.api.list_conversations().await?;
        sort_conversations(&mut list);
        self.conversations = list;
        Ok(())
    }

    pub async fn rename(&mut self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ClientError::Invalid("Title cannot be empty".into()));
        }

        let api = Arc::clone(&self.api);
        optimistic(
            &mut self.conversations,
            |list| {
                if let Some(c) = list.iter_mut().find(|c| c.id == id) {
                    c.title = title.to_owned();
                }
            },
            api.rename_conversation(id, title),
        )
        .await?;
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Deleting the active conversation also resets the chat session.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        let api = Arc::clone(&self.api);
        optimistic(&mut self.conversations, |list| list.retain(|c| c.id != id), api.delete_conversation(id)).await?;

        self.previews.remove(id);
        self.search_text.remove(id);
        if self.session.conversation_id().as_deref() == Some(id) {
            self.session.start_new_chat();
        }
        self.refresh_after_mutation().await;
        Ok(())
    }

    pub async fn set_pinned(&mut self, id: &str, pin: bool) -> Result<()> {
        let api = Arc::clone(&self.api);
        optimistic(
            &mut self.conversations,
            |list| {
                if let Some(c) = list.iter_mut().find(|c| c.id == id) {
                    c.pinned_at = pin.then(Utc::now);
                }
                sort_conversations(list);
            },
            api.pin_conversation(id, pin),
        )
        .await?;
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Forget every cached conversation and reset the chat session.
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.previews.clear();
        self.search_text.clear();
        self.session.start_new_chat();
    }

    /// Open `id` in the chat session and cache its text for search.
    pub async fn open(&mut self, id: &str) -> Result<()> {
        self.session.load_conversation(id).await?;
        let text = self
            .session
            .snapshot()
            .messages
            .iter()
            .map(|m| m.content.to_lowercase())
            .collect::<Vec<_>>()
            .join("\n");
        self.search_text.insert(id.to_owned(), text);
        Ok(())
    }

    /// Last few messages of `id`, fetched on first request.
    pub async fn preview(&mut self, id: &str) -> Result<&[MessageDto]> {
        if !self.previews.contains_key(id) {
            let messages = self.api.get_messages(id).await?;
            self.cache(id, messages);
        }
        Ok(self.previews.get(id).map(Vec::as_slice).unwrap_or_default())
    }

    /// Fetch and cache message text for every listed conversation not yet cached.
    pub async fn preload_search(&mut self) {
        let missing: Vec<String> = self
            .conversations
            .iter()
            .filter(|c| !self.search_text.contains_key(&c.id))
            .map(|c| c.id.clone())
            .collect();

        let api = Arc::clone(&self.api);
        let fetched = join_all(missing.iter().map(|id| api.get_messages(id))).await;
        for (id, result) in missing.into_iter().zip(fetched) {
            match result {
                Ok(messages) => self.cache(&id, messages),
                Err(e) => debug!(conversation_id = %id, error = %e, "skipping search preload"),
            }
        }
    }

    /// Conversations whose title or cached text contains `query`, in list order.
    pub fn search(&self, query: &str) -> Vec<&ConversationSummary> {
        let q = query.trim().to_lowercase();
        self.conversations
            .iter()
            .filter(|c| {
                q.is_empty()
                    || c.title.to_lowercase().contains(&q)
                    || self.search_text.get(&c.id).is_some_and(|text| text.contains(&q))
            })
            .collect()
    }

    fn cache(&mut self, id: &str, messages: Vec<MessageDto>) {
        let text = messages
            .iter()
            .map(|m| m.content.to_lowercase())
            .collect::<Vec<_>>()
            .join("\n");
        self.search_text.insert(id.to_owned(), text);

        let start = messages.len().saturating_sub(PREVIEW_MESSAGES);
        self.previews.insert(id.to_owned(), messages[start..].to_vec());
    }

    async fn refresh_after_mutation(&mut self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "failed to refresh conversation list");
        }
    }
}
