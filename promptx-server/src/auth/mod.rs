//! Identity resolution and the conversation ownership guard.

pub mod cookie;
pub mod guest;
pub mod identity;
pub mod password;
pub mod token;

pub use guest::GuestSigner;
pub use identity::CurrentUser;
pub use token::TokenKeys;

use crate::entities::{ConversationRecord, Owner};

/// Signing material derived from the configured secret.
#[derive(Debug)]
pub struct AuthKeys {
    pub tokens: TokenKeys,
    pub guests: GuestSigner,
}

impl AuthKeys {
    pub fn new(secret: &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            tokens: TokenKeys::new(secret),
            guests: GuestSigner::new(secret)?,
        })
    }
}

/// The acting identity of a request. Both halves may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    pub user: Option<String>,
    pub guest: Option<String>,
}

impl Principal {
    /// Combine the verified session user with a `guestId` credential.
    /// Unsigned or tampered guest credentials resolve to no guest.
    pub fn resolve(user: &CurrentUser, guest_credential: Option<&str>, keys: &AuthKeys) -> Self {
        let guest = guest_credential
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| {
                let verified = keys.guests.verify(raw);
                if verified.is_none() {
                    tracing::debug!("ignoring unsigned or tampered guest credential");
                }
                verified
            });
        Self { user: user.user_id().map(str::to_owned), guest }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none() && self.guest.is_none()
    }

    /// Owner for a new conversation: the user when logged in, else the guest.
    pub fn owner(&self) -> Option<Owner> {
        match (&self.user, &self.guest) {
            (Some(user), _) => Some(Owner::User(user.clone())),
            (None, Some(guest)) => Some(Owner::Guest(guest.clone())),
            (None, None) => None,
        }
    }
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authorized,
    NotFound,
    Unauthorized,
}

/// Decide whether `principal` may act on `conversation`.
///
/// A user-owned conversation only accepts its user; a guest credential never
/// substitutes. A guest-owned conversation only accepts the exact guest id.
pub fn authorize(conversation: Option<&ConversationRecord>, principal: &Principal) -> Access {
    let Some(conversation) = conversation else {
        return Access::NotFound;
    };
    let allowed = match &conversation.owner {
        Owner::User(owner) => principal.user.as_deref() == Some(owner.as_str()),
        Owner::Guest(owner) => principal.guest.as_deref() == Some(owner.as_str()),
    };
    if allowed { Access::Authorized } else { Access::Unauthorized }
}


#[cfg(test)]
mod owner_properties {
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::token::CREDENTIALS_TTL;
    use super::*;
    use crate::entities::{ConversationStore, memory_store};

    #[derive(Debug, Clone, Copy)]
    enum GuestInput {
        Absent,
        Blank,
        Signed,
        /// A valid tag moved onto another guest id.
        Tampered,
        /// A plain uuid with no tag.
        Bare,
    }

    fn guest_input() -> impl Strategy<Value = GuestInput> {
        prop_oneof![
            Just(GuestInput::Absent),
            Just(GuestInput::Blank),
            Just(GuestInput::Signed),
            Just(GuestInput::Tampered),
            Just(GuestInput::Bare),
        ]
    }

    fn credential(keys: &AuthKeys, input: GuestInput) -> (Option<String>, Option<String>) {
        let signed = keys.guests.issue();
        let (guest_id, tag) = signed.split_once('.').unwrap();
        match input {
            GuestInput::Absent => (None, None),
            GuestInput::Blank => (Some("   ".to_owned()), None),
            GuestInput::Signed => (Some(signed.clone()), Some(guest_id.to_owned())),
            GuestInput::Tampered => (Some(format!("{}.{tag}", Uuid::new_v4())), None),
            GuestInput::Bare => (Some(Uuid::new_v4().to_string()), None),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn created_conversations_have_exactly_one_owner(
            user in proptest::option::of("[a-z0-9-]{1,24}"),
            guest in guest_input(),
        ) {
            let keys = AuthKeys::new(b"owner-property-secret").unwrap();
            let current = match &user {
                Some(id) => {
                    let token = keys.tokens.issue(id, None, CREDENTIALS_TTL).unwrap();
                    CurrentUser::from(keys.tokens.verify(&token).unwrap())
                }
                None => CurrentUser::anonymous(),
            };
            let (raw, valid_guest) = credential(&keys, guest);

            let principal = Principal::resolve(&current, raw.as_deref(), &keys);
            prop_assert_eq!(principal.guest.clone(), valid_guest.clone());

            let expected = match (&user, &valid_guest) {
                (Some(id), _) => Some(Owner::User(id.clone())),
                (None, Some(id)) => Some(Owner::Guest(id.clone())),
                (None, None) => None,
            };
            let owner = principal.owner();
            prop_assert_eq!(owner.clone(), expected);
            prop_assert_eq!(owner.is_none(), user.is_none() && valid_guest.is_none());

            if let Some(owner) = owner {
                let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
                let stored = runtime.block_on(async {
                    let store = memory_store().await;
                    let outcome = store
                        .create_conversation(ConversationRecord {
                            id: Uuid::new_v4().to_string(),
                            title: "t".into(),
                            owner: owner.clone(),
                            pinned_at: None,
                            idempotency_key: None,
                            created_at: Utc::now(),
                        })
                        .await
                        .unwrap();
                    let listed = store.list_conversations(&owner).await.unwrap();
                    (store.get_conversation(&outcome.id).await.unwrap(), listed.len())
                });
                let (record, listed) = stored;
                prop_assert_eq!(record.map(|r| r.owner), Some(owner));
                prop_assert_eq!(listed, 1);
            }
        }
    }
}
