pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{ConversationRecord, Owner, OwnerKind};
pub use message::MessageRecord;
pub use user::UserRecord;
