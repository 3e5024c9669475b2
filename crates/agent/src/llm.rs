use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use soundchain_core::config::{FallbackLlmConfig, FastLlmConfig};
use soundchain_core::domain::conversation::{Message, Role};
use thiserror::Error;
use tracing::error;

/// Failure talking to an external text-generation service. Never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("{service} request failed: {message}")]
    Transport { service: &'static str, message: String },
    #[error("{service} returned HTTP {status}: {body}")]
    Status { service: &'static str, status: u16, body: String },
    #[error("{service} returned a malformed payload: {message}")]
    MalformedPayload { service: &'static str, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the service for a JSON object instead of prose.
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>, temperature: f32) -> Self {
        Self { messages, temperature, max_tokens: 1024, json_mode: false }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.role == Role::System)
            .map(|message| message.content.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn service(&self) -> &'static str;
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CollaboratorError>;
}

pub(crate) fn http_client(
    service: &'static str,
    timeout_secs: u64,
) -> Result<Client, CollaboratorError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|err| CollaboratorError::Transport { service, message: err.to_string() })
}

pub(crate) fn require_key(
    api_key: &Option<SecretString>,
    service: &'static str,
) -> Result<SecretString, CollaboratorError> {
    api_key
        .as_ref()
        .filter(|key| !key.expose_secret().trim().is_empty())
        .cloned()
        .ok_or(CollaboratorError::NotConfigured(service))
}

pub(crate) async fn send_json(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<Value, CollaboratorError> {
    let response = request.send().await.map_err(|err| {
        error!(event_name = "collaborator.request_failed", service, error = %err, "request failed");
        CollaboratorError::Transport { service, message: err.to_string() }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(
            event_name = "collaborator.status_failed",
            service,
            status = status.as_u16(),
            "non-success response"
        );
        return Err(CollaboratorError::Status { service, status: status.as_u16(), body });
    }

    response
        .json::<Value>()
        .await
        .map_err(|err| CollaboratorError::MalformedPayload { service, message: err.to_string() })
}

/// OpenAI-compatible `chat/completions` endpoint.
#[derive(Clone)]
pub struct FastCompletionClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl FastCompletionClient {
    pub const SERVICE: &'static str = "fast_llm";

    pub fn from_config(config: &FastLlmConfig) -> Result<Self, CollaboratorError> {
        let api_key = require_key(&config.api_key, Self::SERVICE)?;
        Ok(Self {
            client: http_client(Self::SERVICE, config.timeout_secs)?,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn request_body(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|message| json!({ "role": message.role.as_str(), "content": message.content }))
            .collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
        });
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

pub fn parse_chat_completion(payload: Value) -> Result<Completion, CollaboratorError> {
    let parsed: ChatCompletionResponse = serde_json::from_value(payload).map_err(|err| {
        CollaboratorError::MalformedPayload {
            service: FastCompletionClient::SERVICE,
            message: err.to_string(),
        }
    })?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    Ok(Completion { text, tokens_used: parsed.usage.and_then(|usage| usage.total_tokens) })
}

#[async_trait]
impl LlmClient for FastCompletionClient {
    fn service(&self) -> &'static str {
        Self::SERVICE
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CollaboratorError> {
        let payload = send_json(
            Self::SERVICE,
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(self.api_key.expose_secret())
                .json(&self.request_body(request)),
        )
        .await?;
        parse_chat_completion(payload)
    }
}

/// Messages API: the system prompt travels outside the message list and the
/// response reports input and output token usage.
#[derive(Clone)]
pub struct MessagesClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl MessagesClient {
    pub const SERVICE: &'static str = "fallback_llm";
    const API_VERSION: &'static str = "2023-06-01";

    pub fn from_config(config: &FallbackLlmConfig) -> Result<Self, CollaboratorError> {
        let api_key = require_key(&config.api_key, Self::SERVICE)?;
        Ok(Self {
            client: http_client(Self::SERVICE, config.timeout_secs)?,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn request_body(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|message| message.role != Role::System)
            .map(|message| json!({ "role": message.role.as_str(), "content": message.content }))
            .collect();
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });
        if let Some(system) = request.system_prompt() {
            body["system"] = Value::String(system.to_string());
        }
        body
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

pub fn parse_messages_response(payload: Value) -> Result<Completion, CollaboratorError> {
    let parsed: MessagesResponse = serde_json::from_value(payload).map_err(|err| {
        CollaboratorError::MalformedPayload {
            service: MessagesClient::SERVICE,
            message: err.to_string(),
        }
    })?;

    let text = parsed
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .unwrap_or_default();
    Ok(Completion {
        text,
        tokens_used: parsed.usage.map(|usage| usage.input_tokens + usage.output_tokens),
    })
}

#[async_trait]
impl LlmClient for MessagesClient {
    fn service(&self) -> &'static str {
        Self::SERVICE
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CollaboratorError> {
        let payload = send_json(
            Self::SERVICE,
            self.client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", self.api_key.expose_secret())
                .header("anthropic-version", Self::API_VERSION)
                .json(&self.request_body(request)),
        )
        .await?;
        parse_messages_response(payload)
    }
}
