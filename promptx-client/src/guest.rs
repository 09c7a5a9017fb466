use tracing::info;

use crate::api::ChatApi;
use crate::error::Result;
use crate::storage::{GUEST_ID_KEY, LocalStore};

/// The signed guest credential this install sends as `guestId`.
///
/// Issued by the server once and kept in local storage afterwards. Logging in
/// does not migrate conversations owned by this credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestIdentity(String);

impl GuestIdentity {
    pub async fn load_or_issue(api: &dyn ChatApi, store: &dyn LocalStore) -> Result<Self> {
        if let Some(existing) = store.get(GUEST_ID_KEY).filter(|v| !v.trim().is_empty()) {
            return Ok(Self(existing));
        }

        let credential = api.issue_guest().await?;
        store.set(GUEST_ID_KEY, &credential)?;
        info!("issued new guest identity");
        Ok(Self(credential))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
