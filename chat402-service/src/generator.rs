//! Reply generation.
//!
//! [`TextGenerator`] is the seam between the paid endpoint and whatever
//! writes the reply. [`GroqGenerator`] calls Groq's OpenAI-compatible chat
//! completions API; [`EchoGenerator`] answers locally and is used when no API
//! key is configured.

use async_trait::async_trait;
use chat402::chat::ChatMessage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Groq's OpenAI-compatible API root.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Errors from a text generation backend.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The request could not be sent or the reply could not be read.
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {body}")]
    Provider {
        /// HTTP status of the provider response.
        status: reqwest::StatusCode,
        /// Response body, as far as it could be read.
        body: String,
    },
    /// The provider answered without any choice.
    #[error("provider returned no choices")]
    Empty,
    /// The endpoint URL could not be built.
    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Produces the assistant reply for a conversation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Name of the model, reported back in every reply.
    fn model(&self) -> &str;

    /// Generates the next assistant message for `messages`.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generates replies with Groq.
#[derive(Clone)]
pub struct GroqGenerator {
    http: Client,
    api_key: String,
    base_url: Url,
    model: String,
}

impl std::fmt::Debug for GroqGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqGenerator")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl GroqGenerator {
    /// Creates a generator against the public Groq API.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Url`] if the built-in base URL fails to parse.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, GenerationError> {
        Ok(Self::with_base_url(api_key, model, GROQ_BASE_URL.parse()?))
    }

    /// Creates a generator against any OpenAI-compatible API root.
    #[must_use]
    pub fn with_base_url(api_key: impl Into<String>, model: impl Into<String>, base_url: Url) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url,
            model: model.into(),
        }
    }

    fn endpoint(&self) -> Result<Url, GenerationError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(base.join("chat/completions")?)
    }
}

#[async_trait]
impl TextGenerator for GroqGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let response = self
            .http
            .post(self.endpoint()?)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "generation provider refused the request");
            return Err(GenerationError::Provider { status, body });
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(GenerationError::Empty)
    }
}

/// Answers by echoing the last user message; needs no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGenerator;

impl EchoGenerator {
    /// Model name reported by echoed replies.
    pub const MODEL: &'static str = "echo";
}

#[async_trait]
impl TextGenerator for EchoGenerator {
    fn model(&self) -> &str {
        Self::MODEL
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .or_else(|| messages.last())
            .map_or("", |m| m.content.as_str());
        Ok(format!("You said: {last}"))
    }
}
