//! Server configuration, loaded from environment variables at startup.

use std::fmt;
use std::time::Duration;

use rand::RngCore;
use tracing::warn;

/// Runtime configuration for promptx-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set. `Debug` output never includes
/// secrets.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://promptx.db?mode=rwc"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for daily-rolling log files. Console only when unset.
    pub log_dir: Option<String>,

    /// Comma-separated CORS origin allow-list. Wildcard when unset.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,

    /// HMAC secret for session tokens and guest credentials.
    pub token_secret: Vec<u8>,

    /// Adds `Secure` to the session cookie.
    pub cookie_secure: bool,

    pub llm: LlmConfig,

    /// Public origin of the web app, used for OAuth redirects.
    pub public_base_url: String,

    pub google: Option<GoogleConfig>,
}

/// OpenAI-compatible completion endpoint.
#[derive(Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
}

const REDACTED: &str = "<redacted>";

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("database_url", &self.database_url)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("log_dir", &self.log_dir)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("enable_swagger", &self.enable_swagger)
            .field("token_secret", &REDACTED)
            .field("cookie_secure", &self.cookie_secure)
            .field("llm", &self.llm)
            .field("public_base_url", &self.public_base_url)
            .field("google", &self.google)
            .finish()
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &REDACTED)
            .finish()
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };

        let token_secret = match non_empty("PROMPTX_TOKEN_SECRET") {
            Some(secret) => secret.into_bytes(),
            None => {
                warn!("PROMPTX_TOKEN_SECRET is not set; sessions will not survive a restart");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };

        let google = match (non_empty("PROMPTX_GOOGLE_CLIENT_ID"), non_empty("PROMPTX_GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig { client_id, client_secret }),
            _ => None,
        };

        Self {
            bind_address: env_or("PROMPTX_BIND", "0.0.0.0:3000"),
            database_url: env_or("PROMPTX_DATABASE_URL", "sqlite://promptx.db?mode=rwc"),
            log_level: env_or("PROMPTX_LOG", "info"),
            log_json: flag("PROMPTX_LOG_JSON", false),
            log_dir: non_empty("PROMPTX_LOG_DIR"),
            cors_allowed_origins: non_empty("PROMPTX_CORS_ORIGINS"),
            enable_swagger: flag("PROMPTX_ENABLE_SWAGGER", true),
            token_secret,
            cookie_secure: flag("PROMPTX_COOKIE_SECURE", false),
            llm: LlmConfig {
                base_url: env_or("PROMPTX_LLM_BASE_URL", "https://api.groq.com/openai/v1"),
                api_key: non_empty("PROMPTX_LLM_API_KEY").or_else(|| non_empty("GROQ_API_KEY")),
                model: env_or("PROMPTX_LLM_MODEL", "llama-3.3-70b-versatile"),
                timeout: Duration::from_secs(parse_or(lookup("PROMPTX_LLM_TIMEOUT_SECS"), 60)),
            },
            public_base_url: env_or("PROMPTX_PUBLIC_BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_owned(),
            google,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.bind_address, "0.0.0.0:3000");
        assert_eq!(cfg.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(cfg.llm.timeout, Duration::from_secs(60));
        assert!(cfg.enable_swagger);
        assert!(cfg.llm.api_key.is_none());
        assert!(cfg.google.is_none());
        assert_eq!(cfg.token_secret.len(), 32);
    }

    #[test]
    fn groq_key_is_used_as_fallback() {
        let cfg = config_from(&[("GROQ_API_KEY", "gsk_test")]);
        assert_eq!(cfg.llm.api_key.as_deref(), Some("gsk_test"));

        let cfg = config_from(&[("GROQ_API_KEY", "gsk_test"), ("PROMPTX_LLM_API_KEY", "primary")]);
        assert_eq!(cfg.llm.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn invalid_numbers_fall_back_to_default() {
        let cfg = config_from(&[("PROMPTX_LLM_TIMEOUT_SECS", "soon"), ("PROMPTX_LOG_JSON", "TRUE")]);
        assert_eq!(cfg.llm.timeout, Duration::from_secs(60));
        assert!(cfg.log_json);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = config_from(&[
            ("PROMPTX_TOKEN_SECRET", "tok-secret-value"),
            ("PROMPTX_LLM_API_KEY", "gsk_live_key"),
            ("PROMPTX_GOOGLE_CLIENT_ID", "client-id.apps"),
            ("PROMPTX_GOOGLE_CLIENT_SECRET", "google-secret-value"),
        ]);
        let printed = format!("{cfg:?}");
        for secret in ["tok-secret-value", "gsk_live_key", "google-secret-value"] {
            assert!(!printed.contains(secret), "{secret} leaked into {printed}");
        }
        assert!(printed.contains("client-id.apps"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn google_requires_both_halves() {
        let cfg = config_from(&[("PROMPTX_GOOGLE_CLIENT_ID", "id")]);
        assert!(cfg.google.is_none());
        let cfg = config_from(&[("PROMPTX_GOOGLE_CLIENT_ID", "id"), ("PROMPTX_GOOGLE_CLIENT_SECRET", "s")]);
        assert_eq!(cfg.google.map(|g| g.client_id), Some("id".to_owned()));
    }
}
