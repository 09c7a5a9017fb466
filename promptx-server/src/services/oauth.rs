//! Google OAuth 2.0 authorization-code exchange.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Profile fields used to find or create an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GoogleProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[async_trait]
pub trait OAuthExchange: Send + Sync {
    /// Consent screen URL, or `None` when no client is configured.
    fn authorize_url(&self, redirect_uri: &str) -> Option<String>;

    async fn exchange(&self, code: &str, redirect_uri: &str) -> anyhow::Result<GoogleProfile>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

pub struct GoogleOAuth {
    client: Client,
    config: Option<GoogleConfig>,
}

impl GoogleOAuth {
    pub fn new(config: Option<GoogleConfig>) -> Self {
        Self { client: Client::new(), config }
    }
}

#[async_trait]
impl OAuthExchange for GoogleOAuth {
    fn authorize_url(&self, redirect_uri: &str) -> Option<String> {
        let config = self.config.as_ref()?;
        let url = reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("prompt", "select_account"),
            ],
        )
        .ok()?;
        Some(url.into())
    }

    async fn exchange(&self, code: &str, redirect_uri: &str) -> anyhow::Result<GoogleProfile> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Google OAuth is not configured"))?;

        let token: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .json()
            .await?;
        let access_token = token
            .access_token
            .ok_or_else(|| anyhow::anyhow!("token exchange returned no access token"))?;

        let profile: GoogleProfile = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(profile)
    }
}

/// Username for a new Google account: the display name without whitespace,
/// lowercased, else the local part of the email.
pub fn derive_username(name: Option<&str>, email: &str) -> String {
    let from_name: String = name
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if !from_name.is_empty() {
        return from_name;
    }
    email.split('@').next().unwrap_or(email).to_owned()
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Returns a fixed profile for the code `"good"` and fails otherwise.
    pub struct StaticOAuth(pub GoogleProfile);

    #[async_trait]
    impl OAuthExchange for StaticOAuth {
        fn authorize_url(&self, redirect_uri: &str) -> Option<String> {
            Some(format!("https://accounts.example/auth?redirect_uri={redirect_uri}"))
        }

        async fn exchange(&self, code: &str, _redirect_uri: &str) -> anyhow::Result<GoogleProfile> {
            if code == "good" {
                Ok(self.0.clone())
            } else {
                anyhow::bail!("invalid_grant")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_prefers_compacted_name() {
        assert_eq!(derive_username(Some("Jay Patel"), "jp@example.com"), "jaypatel");
        assert_eq!(derive_username(Some("  "), "jp@example.com"), "jp");
        assert_eq!(derive_username(None, "jp@example.com"), "jp");
    }

    #[test]
    fn authorize_url_requires_configuration() {
        assert!(GoogleOAuth::new(None).authorize_url("http://x/cb").is_none());

        let oauth = GoogleOAuth::new(Some(GoogleConfig { client_id: "cid".into(), client_secret: "s".into() }));
        let url = oauth.authorize_url("http://localhost:3000/api/auth/callback").unwrap();
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("prompt=select_account"));
        assert!(url.contains("scope=openid+email+profile"));
    }
}
