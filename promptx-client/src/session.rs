//! Chat session controller.
//!
//! A send goes through: optimistic user message, conversation creation (first
//! send only), user message persisted, completion, assistant placeholder,
//! incremental reveal, assistant message persisted. Observers follow along
//! through [`ChatSession::subscribe`].
//!
//! Every send captures the session epoch. Starting a new chat or loading
//! another conversation bumps it, and a reply that lands for an older epoch
//! is dropped instead of being appended to whatever is now on screen. A load
//! only bumps the epoch once its messages have arrived, so a failed load
//! leaves the running send alone.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use promptx_types::{AttachmentMeta, MessageDto, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::ChatApi;
use crate::error::Result;
use crate::reveal;
use crate::storage::{CONVERSATION_ID_KEY, LocalStore, MESSAGES_KEY};

/// Shown when the completion comes back empty.
pub const EMPTY_REPLY: &str = "No response generated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Creating,
    Sending,
    Typing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentMeta>,
}

impl LocalMessage {
    pub fn user(content: impl Into<String>, attachments: Vec<AttachmentMeta>) -> Self {
        Self { role: Role::User, content: content.into(), attachments }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), attachments: Vec::new() }
    }
}

impl From<MessageDto> for LocalMessage {
    fn from(m: MessageDto) -> Self {
        Self { role: m.role, content: m.content, attachments: m.attachments }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub conversation_id: Option<String>,
    pub messages: Vec<LocalMessage>,
    /// Last failure, cleared by the next send.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    /// Blank input; nothing happened.
    Ignored,
    /// Another send was in flight.
    Dropped,
    /// The session moved on before the reply arrived.
    Stale,
    /// Creation or completion failed; the text is also shown in the transcript.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub reveal_tick: Duration,
    pub reveal_chunk_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { reveal_tick: Duration::from_millis(15), reveal_chunk_chars: 3 }
    }
}

pub struct ChatSession {
    api: Arc<dyn ChatApi>,
    store: Arc<dyn LocalStore>,
    config: SessionConfig,
    sending: AtomicBool,
    epoch: AtomicU64,
    /// Latest `load_conversation` request; older loads finishing late are dropped.
    loads: AtomicU64,
    state: watch::Sender<SessionSnapshot>,
}

/// Clears the reentrancy flag when a send finishes, unless the session has
/// already moved to a newer epoch (which clears it itself).
struct InFlight<'a> {
    session: &'a ChatSession,
    epoch: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.session.epoch.load(Ordering::Acquire) == self.epoch {
            self.session.sending.store(false, Ordering::Release);
        }
    }
}

impl ChatSession {
    /// Restore the last active conversation and transcript from `store`.
    pub fn new(api: Arc<dyn ChatApi>, store: Arc<dyn LocalStore>, config: SessionConfig) -> Self {
        let conversation_id = store.get(CONVERSATION_ID_KEY).filter(|id| !id.is_empty());
        let messages = match store.get(MESSAGES_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "discarding unreadable saved transcript");
                Vec::new()
            }),
            None => Vec::new(),
        };
        let (state, _) = watch::channel(SessionSnapshot { conversation_id, messages, ..SessionSnapshot::default() });

        Self {
            api,
            store,
            config,
            sending: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.state.borrow().conversation_id.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Forget the active conversation. An in-flight send becomes stale.
    pub fn start_new_chat(&self) {
        self.next_epoch();
        self.state.send_replace(SessionSnapshot::default());
        for key in [CONVERSATION_ID_KEY, MESSAGES_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to clear saved session");
            }
        }
        debug!("started new chat");
    }

    /// Make `id` the active conversation, replacing the transcript with the
    /// server's copy. Once the messages arrive an in-flight send becomes
    /// stale; if the fetch fails the session is left untouched.
    pub async fn load_conversation(&self, id: &str) -> Result<()> {
        let ticket = self.loads.fetch_add(1, Ordering::AcqRel) + 1;
        let messages = self.api.get_messages(id).await.inspect_err(|e| {
            warn!(conversation_id = %id, error = %e, "failed to load conversation");
        })?;
        if self.loads.load(Ordering::Acquire) != ticket {
            debug!(conversation_id = %id, "newer navigation superseded this load");
            return Ok(());
        }
        self.next_epoch();

        self.state.send_replace(SessionSnapshot {
            phase: Phase::Idle,
            conversation_id: Some(id.to_owned()),
            messages: messages.into_iter().map(LocalMessage::from).collect(),
            error: None,
        });
        self.persist();
        Ok(())
    }

    pub async fn send(&self, input: &str, files: Vec<AttachmentMeta>) -> SendOutcome {
        let content = input.trim();
        if content.is_empty() {
            return SendOutcome::Ignored;
        }
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("send dropped: another send is in flight");
            return SendOutcome::Dropped;
        }
        let epoch = self.epoch.load(Ordering::Acquire);
        let _in_flight = InFlight { session: self, epoch };

        self.state.send_modify(|s| {
            s.messages.push(LocalMessage::user(content, files.clone()));
            s.error = None;
        });
        self.persist();

        let conversation_id = match self.conversation_id() {
            Some(id) => id,
            None => match self.create_conversation(epoch).await {
                Ok(Some(id)) => id,
                Ok(None) => return SendOutcome::Stale,
                Err(message) => return self.fail(message, false),
            },
        };

        self.set_phase(Phase::Sending);
        if let Err(e) = self.api.create_message(&conversation_id, Role::User, content, files.clone()).await {
            warn!(conversation_id = %conversation_id, error = %e, "failed to save user message");
        }

        let reply = self.api.chat(content, files).await;
        if self.is_stale(epoch) {
            debug!(conversation_id = %conversation_id, "discarding reply for a previous session");
            return SendOutcome::Stale;
        }

        let text = match reply {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_owned(),
            Ok(text) => text,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "completion failed");
                return self.fail(e.to_string(), true);
            }
        };

        if !self.reveal(&text, epoch).await {
            return SendOutcome::Stale;
        }
        self.persist();

        if let Err(e) = self.api.create_message(&conversation_id, Role::Assistant, &text, Vec::new()).await {
            warn!(conversation_id = %conversation_id, error = %e, "failed to save assistant message");
        }
        self.set_phase(Phase::Idle);
        SendOutcome::Completed
    }

    /// `Ok(None)` when the session moved on while the request was in flight.
    async fn create_conversation(&self, epoch: u64) -> std::result::Result<Option<String>, String> {
        self.set_phase(Phase::Creating);
        let key = Uuid::new_v4().to_string();
        let id = self.api.create_conversation(None, Some(&key)).await.map_err(|e| {
            warn!(error = %e, "failed to create conversation");
            e.to_string()
        })?;
        if self.is_stale(epoch) {
            return Ok(None);
        }

        self.state.send_modify(|s| s.conversation_id = Some(id.clone()));
        self.persist();
        info!(conversation_id = %id, "conversation created");
        Ok(Some(id))
    }

    /// Returns `false` if the session moved on mid-animation.
    async fn reveal(&self, text: &str, epoch: u64) -> bool {
        self.state.send_modify(|s| {
            s.phase = Phase::Typing;
            s.messages.push(LocalMessage::assistant(""));
        });

        for prefix in reveal::prefixes(text, self.config.reveal_chunk_chars) {
            if self.is_stale(epoch) {
                return false;
            }
            self.state.send_modify(|s| {
                if let Some(last) = s.messages.last_mut() {
                    last.content = prefix.to_owned();
                }
            });
            if !self.config.reveal_tick.is_zero() {
                tokio::time::sleep(self.config.reveal_tick).await;
            }
        }
        !self.is_stale(epoch)
    }

    /// Record a failure. With `bubble`, the error text is also appended as an
    /// assistant message so the turn always shows a reply.
    fn fail(&self, message: String, bubble: bool) -> SendOutcome {
        self.state.send_modify(|s| {
            if bubble {
                s.messages.push(LocalMessage::assistant(format!("Error: {message}")));
            }
            s.phase = Phase::Error;
            s.error = Some(message.clone());
        });
        self.persist();
        SendOutcome::Failed(message)
    }

    fn set_phase(&self, phase: Phase) {
        self.state.send_modify(|s| s.phase = phase);
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::Acquire) != epoch
    }

    fn next_epoch(&self) {
        self.loads.fetch_add(1, Ordering::AcqRel);
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.sending.store(false, Ordering::Release);
    }

    fn persist(&self) {
        let (conversation_id, messages) = {
            let state = self.state.borrow();
            (state.conversation_id.clone(), serde_json::to_string(&state.messages))
        };

        let result = match conversation_id {
            Some(id) => self.store.set(CONVERSATION_ID_KEY, &id),
            None => self.store.remove(CONVERSATION_ID_KEY),
        }
        .and_then(|()| self.store.set(MESSAGES_KEY, &messages?));
        if let Err(e) = result {
            warn!(error = %e, "failed to save session locally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeApi;
    use crate::storage::MemoryStore;
    use tokio::sync::Notify;
    use tracing_test::traced_test;

    fn fast() -> SessionConfig {
        SessionConfig { reveal_tick: Duration::ZERO, reveal_chunk_chars: 4 }
    }

    fn session_with(api: Arc<FakeApi>, store: Arc<MemoryStore>) -> ChatSession {
        ChatSession::new(api, store, fast())
    }

    fn roles(snapshot: &SessionSnapshot) -> Vec<(Role, &str)> {
        snapshot.messages.iter().map(|m| (m.role, m.content.as_str())).collect()
    }

    #[tokio::test]
    async fn first_send_creates_conversation_and_persists_both_turns() {
        let api = Arc::new(FakeApi::new());
        api.reply_with("You are a senior poet. Write a haiku...");
        let session = session_with(api.clone(), Arc::new(MemoryStore::new()));

        let outcome = session.send("  write a haiku  ", Vec::new()).await;
        assert_eq!(outcome, SendOutcome::Completed);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(
            roles(&snapshot),
            vec![(Role::User, "write a haiku"), (Role::Assistant, "You are a senior poet. Write a haiku...")]
        );

        let id = snapshot.conversation_id.unwrap();
        assert_eq!(
            api.stored(&id),
            vec![
                (Role::User, "write a haiku".to_owned()),
                (Role::Assistant, "You are a senior poet. Write a haiku...".to_owned())
            ]
        );
        let keys = api.state.lock().unwrap().create_keys.clone();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].is_some());
    }

    #[tokio::test]
    async fn later_sends_reuse_the_conversation() {
        let api = Arc::new(FakeApi::new());
        let session = session_with(api.clone(), Arc::new(MemoryStore::new()));

        session.send("one", Vec::new()).await;
        let id = session.conversation_id();
        session.send("two", Vec::new()).await;

        assert_eq!(session.conversation_id(), id);
        assert_eq!(api.calls("create_conversation"), 1);
        assert_eq!(session.snapshot().messages.len(), 4);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let api = Arc::new(FakeApi::new());
        let session = session_with(api.clone(), Arc::new(MemoryStore::new()));

        assert_eq!(session.send("   ", Vec::new()).await, SendOutcome::Ignored);
        assert!(session.snapshot().messages.is_empty());
        assert!(api.state.lock().unwrap().calls.is_empty());
    }

    #[tokio::test]
    async fn second_send_while_in_flight_is_dropped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let api = Arc::new(FakeApi::gated(entered.clone(), release.clone()));
        let session = session_with(api.clone(), Arc::new(MemoryStore::new()));

        let (first, second) = tokio::join!(session.send("one", Vec::new()), async {
            entered.notified().await;
            let outcome = session.send("two", Vec::new()).await;
            release.notify_one();
            outcome
        });

        assert_eq!(first, SendOutcome::Completed);
        assert_eq!(second, SendOutcome::Dropped);
        assert_eq!(api.calls("chat"), 1);
        assert!(!session.is_sending());
        let users: Vec<_> = session.snapshot().messages.into_iter().filter(|m| m.role == Role::User).collect();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn upstream_failure_becomes_an_assistant_bubble() {
        let api = Arc::new(FakeApi::new());
        let session = session_with(api.clone(), Arc::new(MemoryStore::new()));
        api.fail("chat");

        let outcome = session.send("hello", Vec::new()).await;
        assert_eq!(outcome, SendOutcome::Failed("chat failed".into()));
        assert!(logs_contain("completion failed"));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Phase::Error);
        assert_eq!(snapshot.error.as_deref(), Some("chat failed"));
        assert_eq!(roles(&snapshot), vec![(Role::User, "hello"), (Role::Assistant, "Error: chat failed")]);

        let id = snapshot.conversation_id.unwrap();
        assert_eq!(api.stored(&id), vec![(Role::User, "hello".to_owned())]);
        assert!(!session.is_sending());

        api.heal("chat");
        assert_eq!(session.send("again", Vec::new()).await, SendOutcome::Completed);
        assert_eq!(session.snapshot().error, None);
    }

    #[tokio::test]
    async fn failed_creation_keeps_the_local_user_message() {
        let api = Arc::new(FakeApi::new());
        api.fail("create_conversation");
        let session = session_with(api.clone(), Arc::new(MemoryStore::new()));

        let outcome = session.send("hello", Vec::new()).await;
        assert!(matches!(outcome, SendOutcome::Failed(_)));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Phase::Error);
        assert_eq!(snapshot.conversation_id, None);
        assert_eq!(roles(&snapshot), vec![(Role::User, "hello")]);
        assert_eq!(api.calls("chat"), 0);
    }

    #[tokio::test]
    async fn reply_for_an_abandoned_chat_is_discarded() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let api = Arc::new(FakeApi::gated(entered.clone(), release.clone()));
        let session = session_with(api.clone(), Arc::new(MemoryStore::new()));

        let (outcome, old_id) = tokio::join!(session.send("one", Vec::new()), async {
            entered.notified().await;
            let id = session.conversation_id();
            session.start_new_chat();
            release.notify_one();
            id
        });

        assert_eq!(outcome, SendOutcome::Stale);
        assert_eq!(session.snapshot(), SessionSnapshot::default());
        assert_eq!(api.stored(&old_id.unwrap()), vec![(Role::User, "one".to_owned())]);
        assert!(!session.is_sending());
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_load_mid_send_lets_the_send_finish() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let api = Arc::new(FakeApi::gated(entered.clone(), release.clone()));
        let session = session_with(api.clone(), Arc::new(MemoryStore::new()));

        let (outcome, load) = tokio::join!(session.send("one", Vec::new()), async {
            entered.notified().await;
            let load = session.load_conversation("does-not-exist").await;
            release.notify_one();
            load
        });

        assert!(load.unwrap_err().is_not_found());
        assert!(logs_contain("failed to load conversation"));
        assert_eq!(outcome, SendOutcome::Completed);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(roles(&snapshot), vec![(Role::User, "one"), (Role::Assistant, "Enhanced: one")]);
        assert!(!session.is_sending());
    }

    #[tokio::test]
    async fn successful_load_mid_send_replaces_the_transcript() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let api = Arc::new(FakeApi::gated(entered.clone(), release.clone()));
        let other = api.seed("other chat", 5);
        api.seed_message(&other, Role::User, "q");
        let session = session_with(api.clone(), Arc::new(MemoryStore::new()));

        let (outcome, load) = tokio::join!(session.send("one", Vec::new()), async {
            entered.notified().await;
            let load = session.load_conversation(&other).await;
            release.notify_one();
            load
        });

        load.unwrap();
        assert_eq!(outcome, SendOutcome::Stale);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.conversation_id.as_deref(), Some(other.as_str()));
        assert_eq!(roles(&snapshot), vec![(Role::User, "q")]);
        assert!(!session.is_sending());
    }

    #[tokio::test]
    async fn empty_reply_uses_placeholder_text() {
        let api = Arc::new(FakeApi::new());
        api.reply_with("   ");
        let session = session_with(api, Arc::new(MemoryStore::new()));

        session.send("hi", Vec::new()).await;
        assert_eq!(session.snapshot().messages[1].content, EMPTY_REPLY);
    }

    #[tokio::test]
    async fn session_is_restored_from_local_storage() {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(MemoryStore::new());
        let session = session_with(api.clone(), store.clone());
        session.send("remember me", Vec::new()).await;
        let before = session.snapshot();

        let restored = session_with(api, store.clone());
        let after = restored.snapshot();
        assert_eq!(after.conversation_id, before.conversation_id);
        assert_eq!(after.messages, before.messages);

        restored.start_new_chat();
        assert_eq!(store.get(CONVERSATION_ID_KEY), None);
        assert_eq!(store.get(MESSAGES_KEY), None);
    }

    #[tokio::test]
    async fn corrupt_saved_transcript_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(MESSAGES_KEY, "{not json").unwrap();
        let session = session_with(Arc::new(FakeApi::new()), store);
        assert!(session.snapshot().messages.is_empty());
    }

    #[tokio::test]
    async fn load_conversation_replaces_transcript() {
        let api = Arc::new(FakeApi::new());
        let id = api.seed("old chat", 5);
        api.seed_message(&id, Role::User, "q");
        api.seed_message(&id, Role::Assistant, "a");
        let session = session_with(api, Arc::new(MemoryStore::new()));

        session.load_conversation(&id).await.unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.conversation_id.as_deref(), Some(id.as_str()));
        assert_eq!(roles(&snapshot), vec![(Role::User, "q"), (Role::Assistant, "a")]);
    }

    #[tokio::test]
    async fn observers_see_the_typing_phase() {
        let api = Arc::new(FakeApi::new());
        api.reply_with("a reply long enough to take several ticks");
        let session = Arc::new(ChatSession::new(
            api,
            Arc::new(MemoryStore::new()),
            SessionConfig { reveal_tick: Duration::from_millis(1), reveal_chunk_chars: 2 },
        ));
        let mut rx = session.subscribe();

        let watcher = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let phase = rx.borrow_and_update().phase;
                if seen.last() != Some(&phase) {
                    seen.push(phase);
                }
                if phase == Phase::Idle && seen.contains(&Phase::Typing) {
                    break;
                }
            }
            seen
        });

        session.send("go", Vec::new()).await;
        let seen = watcher.await.unwrap();
        assert!(seen.contains(&Phase::Typing));
        assert_eq!(seen.last(), Some(&Phase::Idle));
    }
}
