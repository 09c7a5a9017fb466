//! Switching between the guest and a logged-in account.
//!
//! Conversations started as a guest stay owned by the guest credential; they
//! are not migrated on login and disappear from the list on logout.

use promptx_types::UserProfile;
use tracing::{info, warn};

use crate::api::ChatApi;
use crate::error::{ClientError, Result};
use crate::history::HistoryPanel;
use crate::storage::{GUEST_ID_KEY, LocalStore};

/// Log in and confirm the session with `/me`.
///
/// On success the history is reloaded for the account.
pub async fn log_in(
    api: &dyn ChatApi,
    history: &mut HistoryPanel,
    email: &str,
    password: &str,
) -> Result<UserProfile> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ClientError::Invalid("Email and password required".into()));
    }

    api.login(email, password).await?;
    let profile = api.me().await?;
    info!(user_id = %profile.id, "logged in");

    history.clear();
    if let Err(e) = history.refresh().await {
        warn!(error = %e, "failed to load account history");
    }
    Ok(profile)
}

/// Log out, then drop the conversation list, the active chat and the saved
/// guest credential. Nothing local is cleared if the server call fails.
pub async fn log_out(api: &dyn ChatApi, history: &mut HistoryPanel, store: &dyn LocalStore) -> Result<()> {
    api.logout().await?;
    history.clear();
    store.remove(GUEST_ID_KEY)?;
    info!("logged out");
    Ok(())
}
