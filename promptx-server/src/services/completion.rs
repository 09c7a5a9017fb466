//! Completion Gateway: one round-trip to an OpenAI-compatible
//! `/chat/completions` endpoint.

use async_trait::async_trait;
use promptx_types::Role;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

/// `/chat` reply when the service answers without any content.
pub const EMPTY_COMPLETION: &str = "No response generated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: &'static str,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }

    pub fn from_role(role: Role, content: impl Into<String>) -> Self {
        let role = match role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self { role, content: content.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatTurn>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("completion service is not configured")]
    NotConfigured,

    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Whether requests can be sent at all (an API key is present).
    fn is_configured(&self) -> bool;

    /// The first choice's text; empty when the service produced none.
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError>;
}

// ── OpenAI-compatible HTTP implementation ─────────────────────────────────────

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: Option<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    message: String,
}

pub struct OpenAiCompatGateway {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatGateway {
    pub fn new(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

/// Prefer the provider's `error.message`; otherwise a bounded slice of the body.
fn error_detail(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<WireErrorBody>(body) {
        return parsed.error.message;
    }
    body.chars().take(200).collect()
}

#[async_trait]
impl CompletionGateway for OpenAiCompatGateway {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::NotConfigured)?;

        let body = WireRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status: status.as_u16(), body: error_detail(&text) });
        }

        let parsed: WireResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();
        Ok(content)
    }
}

// ── Test double ───────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replies from a script and records every request it receives.
    #[derive(Default)]
    pub struct ScriptedGateway {
        configured: bool,
        replies: Mutex<VecDeque<Result<String, GatewayError>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedGateway {
        pub fn new(replies: Vec<Result<String, GatewayError>>) -> Self {
            Self { configured: true, replies: Mutex::new(replies.into()), requests: Mutex::default() }
        }

        pub fn unconfigured() -> Self {
            Self::default()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionGateway for ScriptedGateway {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
            if !self.configured {
                return Err(GatewayError::NotConfigured);
            }
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }
}
