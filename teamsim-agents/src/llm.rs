//! Text-generation backends.
//!
//! Agents only see the [`TextGenerator`] trait. [`LlmClient`] talks to a
//! hosted model (OpenAI-compatible chat completions or the Anthropic messages
//! API) and owns the retry policy; [`ScriptedGenerator`] answers from a fixed
//! script and is what tests and offline demos run against.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::roles::AgentRole;

/// One generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Role the prompt is generated for.
    pub role: AgentRole,
    pub prompt: String,
    pub temperature: f32,
}

/// Failures of the text-generation black box.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("request timed out")]
    Timeout,
    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode model response: {0}")]
    Decode(String),
    #[error("model returned an empty response")]
    Empty,
    #[error("response too short ({len} chars)")]
    TooShort { len: usize },
}

impl GenerationError {
    /// Explanatory text shown in place of the agent's reply.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::RateLimited(_) => {
                "API rate limit exceeded. Please try again in a few moments.".to_string()
            }
            GenerationError::InvalidApiKey => {
                "Invalid API key. Please check your model API key configuration.".to_string()
            }
            GenerationError::Timeout => "Request timed out. Please try again.".to_string(),
            GenerationError::Empty | GenerationError::TooShort { .. } => {
                "Response too short or empty".to_string()
            }
            other => format!("Failed to generate response: {other}"),
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::RateLimited(_)
            | GenerationError::Timeout
            | GenerationError::Transport(_) => true,
            GenerationError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

// ── Hosted model client ────────────────────────────────────────────────

/// Which hosted API to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    OpenAi,
    Anthropic,
}

impl Provider {
    fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => Err(format!("Unknown provider: {other}")),
        }
    }
}

/// Settings for [`LlmClient`].
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's public endpoint (proxies, local gateways).
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub max_tokens: u32,
    /// Extra attempts after the first one, for transient failures only.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl LlmConfig {
    pub fn new(provider: Provider, api_key: String) -> Self {
        let model = match provider {
            Provider::OpenAi => "gpt-4",
            Provider::Anthropic => "claude-sonnet-4-20250514",
        };
        Self {
            provider,
            api_key,
            model: model.to_string(),
            base_url: None,
            timeout: Duration::from_secs(90),
            max_tokens: 4096,
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Client for a hosted chat model.
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn provider(&self) -> Provider {
        self.config.provider
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.config.provider.default_base_url())
            .trim_end_matches('/')
    }

    async fn send_once(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let messages = serde_json::json!([{ "role": "user", "content": &request.prompt }]);
        let builder = match self.config.provider {
            Provider::OpenAi => self
                .http
                .post(format!("{}/v1/chat/completions", self.base_url()))
                .bearer_auth(&self.config.api_key)
                .json(&serde_json::json!({
                    "model": &self.config.model,
                    "temperature": request.temperature,
                    "max_tokens": self.config.max_tokens,
                    "messages": messages,
                })),
            Provider::Anthropic => self
                .http
                .post(format!("{}/v1/messages", self.base_url()))
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&serde_json::json!({
                    "model": &self.config.model,
                    "temperature": request.temperature,
                    "max_tokens": self.config.max_tokens,
                    "messages": messages,
                })),
        };

        let resp = builder.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        match self.config.provider {
            Provider::OpenAi => {
                let completion: ChatCompletion = resp
                    .json()
                    .await
                    .map_err(|e| GenerationError::Decode(e.to_string()))?;
                Ok(completion
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default())
            }
            Provider::Anthropic => {
                let reply: MessagesResponse = resp
                    .json()
                    .await
                    .map_err(|e| GenerationError::Decode(e.to_string()))?;
                Ok(reply
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        ContentBlock::Other => None,
                    })
                    .collect::<Vec<_>>()
                    .join(""))
            }
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut delay = self.config.initial_backoff;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt <= self.config.max_retries => {
                    tracing::warn!(
                        role = %request.role,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    let jitter = rand::random::<u64>() % (delay.as_millis() as u64 / 4 + 1);
                    delay = Duration::from_millis(
                        (delay.as_millis() as u64 * 2 + jitter)
                            .min(self.config.max_backoff.as_millis() as u64),
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Transport(e.to_string())
    }
}

fn classify_status(status: u16, body: String) -> GenerationError {
    let lower = body.to_lowercase();
    match status {
        429 => GenerationError::RateLimited(body),
        401 => GenerationError::InvalidApiKey,
        _ if lower.contains("quota") || lower.contains("rate limit") => {
            GenerationError::RateLimited(body)
        }
        _ if lower.contains("invalid api key") => GenerationError::InvalidApiKey,
        _ => GenerationError::Api { status, body },
    }
}

// ── Scripted backend ───────────────────────────────────────────────────

/// Deterministic generator that answers from a per-role script.
///
/// Roles without a script reply with a short canned sentence and request
/// nobody. Every request is recorded for later inspection.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<HashMap<AgentRole, Result<String, GenerationError>>>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `role` with `text`.
    pub fn with_reply(self, role: AgentRole, text: impl Into<String>) -> Self {
        self.script.lock().insert(role, Ok(text.into()));
        self
    }

    /// Always fail `role` with `error`.
    pub fn with_failure(self, role: AgentRole, error: GenerationError) -> Self {
        self.script.lock().insert(role, Err(error));
        self
    }

    /// Requests seen so far, in call order.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().clone()
    }

    /// Roles invoked so far, in call order.
    pub fn called_roles(&self) -> Vec<AgentRole> {
        self.calls.lock().iter().map(|c| c.role).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.lock().push(request.clone());
        match self.script.lock().get(&request.role) {
            Some(scripted) => scripted.clone(),
            None => Ok(format!(
                "{} acknowledges the request and has nothing further to add.",
                request.role.display_label()
            )),
        }
    }
}
