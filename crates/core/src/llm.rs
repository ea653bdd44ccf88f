//! Language-model collaborator.
//!
//! The service only needs one capability from a model provider: send an ordered list of
//! role-tagged messages and receive a single, non-streamed text reply. [`LanguageModel`] is that
//! seam; [`OpenAiCompatibleClient`] implements it over the `/chat/completions` HTTP API spoken by
//! hosted inference endpoints (and local Ollama-style servers).

use crate::config::ModelConfig;
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A chat model that turns a conversation into one text reply.
///
/// Implementations map every provider failure (transport, timeout, auth, quota, malformed
/// body) to `CoreError::ModelUnavailable`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> CoreResult<String>;

    /// Short label used in logs.
    fn name(&self) -> &str;
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    /// Builds a client from validated model configuration.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ModelUnavailable` if the underlying HTTP client cannot be built.
    pub fn new(cfg: &ModelConfig) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("habit-core/", env!("CARGO_PKG_VERSION")))
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| CoreError::ModelUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> CoreResult<String> {
        debug!(
            "LLM request: model={}, messages={}, temp={}",
            self.model,
            messages.len(),
            self.temperature
        );

        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::ModelUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::ModelUnavailable(format!(
                "HTTP {status}: {}",
                truncate(&text, 300)
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| CoreError::ModelUnavailable(format!("failed to read body: {e}")))?;
        reply_text(&text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Pulls the first choice's content out of a chat completion body.
fn reply_text(body: &str) -> CoreResult<String> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        CoreError::ModelUnavailable(format!("malformed completion response: {e}"))
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| CoreError::ModelUnavailable("empty completion".into()))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
