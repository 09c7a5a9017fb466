//! Client-side state for the PromptX chat UI.
//!
//! [`ChatSession`] drives a single conversation (send, reveal, persist) and
//! [`HistoryPanel`] keeps the sidebar list in sync with the server. Both talk
//! to the server through the [`ChatApi`] trait; [`HttpChatApi`] is the reqwest
//! implementation. [`log_in`] and [`log_out`] switch between the guest and an
//! account.

pub mod account;
pub mod api;
pub mod error;
pub mod guest;
pub mod history;
pub mod optimistic;
pub mod reveal;
pub mod session;
pub mod storage;

pub use account::{log_in, log_out};
pub use api::{ChatApi, HttpChatApi};
pub use error::{ClientError, Result};
pub use guest::GuestIdentity;
pub use history::HistoryPanel;
pub use optimistic::optimistic;
pub use session::{ChatSession, LocalMessage, Phase, SendOutcome, SessionConfig, SessionSnapshot};
pub use storage::{FileStore, LocalStore, MemoryStore};
