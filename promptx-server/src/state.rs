//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::auth::AuthKeys;
use crate::config::Config;
use crate::entities::SqlStore;
use crate::services::completion::{CompletionGateway, OpenAiCompatGateway};
use crate::services::oauth::{GoogleOAuth, OAuthExchange};

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Conversations, messages and accounts.
    pub store: Arc<SqlStore>,
    /// Session-token and guest-credential signing keys.
    pub auth: Arc<AuthKeys>,
    pub gateway: Arc<dyn CompletionGateway>,
    pub oauth: Arc<dyn OAuthExchange>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("gateway_configured", &self.gateway.is_configured())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the production collaborators around an opened store.
    pub fn new(config: Config, store: SqlStore) -> anyhow::Result<Self> {
        let auth = AuthKeys::new(&config.token_secret)?;
        let gateway = OpenAiCompatGateway::new(&config.llm)?;
        let oauth = GoogleOAuth::new(config.google.clone());
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            auth: Arc::new(auth),
            gateway: Arc::new(gateway),
            oauth: Arc::new(oauth),
        })
    }
}
