use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use soundchain_core::config::AgentMemoryConfig;

use crate::llm::{http_client, require_key, send_json, CollaboratorError};

pub const PRODUCER_TERMS_BLOCK: &str = "producer_terms";
pub const EXAMPLES_BLOCK: &str = "examples";
pub const STATE_BLOCK: &str = "state";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub label: String,
    pub value: String,
}

impl MemoryBlock {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

/// Everything needed to create a persistent negotiation agent remotely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub model: String,
    pub embedding: String,
    pub system: String,
    pub memory_blocks: Vec<MemoryBlock>,
}

impl AgentSpec {
    pub fn block(&self, label: &str) -> Option<&MemoryBlock> {
        self.memory_blocks.iter().find(|block| block.label == label)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self { name: name.into(), arguments }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait AgentMemoryClient: Send + Sync {
    /// Returns the opaque id of the new agent.
    async fn create_agent(&self, spec: &AgentSpec) -> Result<String, CollaboratorError>;

    async fn send_message(
        &self,
        agent_id: &str,
        message: &str,
    ) -> Result<AgentReply, CollaboratorError>;
}

#[derive(Clone)]
pub struct HttpAgentMemoryClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl HttpAgentMemoryClient {
    pub const SERVICE: &'static str = "agent_memory";

    pub fn from_config(config: &AgentMemoryConfig) -> Result<Self, CollaboratorError> {
        let api_key = require_key(&config.api_key, Self::SERVICE)?;
        let client = http_client(Self::SERVICE, config.timeout_secs)?;

        Ok(Self { client, api_key, base_url: config.base_url.trim_end_matches('/').to_string() })
    }
}

pub fn create_agent_body(spec: &AgentSpec) -> Value {
    json!({
        "name": spec.name,
        "model": spec.model,
        "embedding": spec.embedding,
        "memory_blocks": spec.memory_blocks,
        "system": spec.system,
    })
}

fn malformed(message: impl Into<String>) -> CollaboratorError {
    CollaboratorError::MalformedPayload {
        service: HttpAgentMemoryClient::SERVICE,
        message: message.into(),
    }
}

pub fn parse_agent_id(payload: &Value) -> Result<String, CollaboratorError> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| malformed("agent response has no id"))
}

fn tool_arguments(raw: Option<&Value>) -> Result<Value, CollaboratorError> {
    match raw {
        None | Some(Value::Null) => Ok(json!({})),
        Some(Value::String(encoded)) if encoded.trim().is_empty() => Ok(json!({})),
        Some(Value::String(encoded)) => serde_json::from_str(encoded)
            .map_err(|err| malformed(format!("tool arguments are not JSON: {err}"))),
        Some(other) => Ok(other.clone()),
    }
}

/// Accepts `{function: {name, arguments}}` and flat `{name, arguments}` call shapes.
fn tool_invocation(call: &Value) -> Result<Option<ToolInvocation>, CollaboratorError> {
    let function = call.get("function").unwrap_or(call);
    let Some(name) = function.get("name").and_then(Value::as_str) else {
        return Ok(None);
    };
    Ok(Some(ToolInvocation::new(name, tool_arguments(function.get("arguments"))?)))
}

pub fn parse_agent_reply(payload: &Value) -> Result<AgentReply, CollaboratorError> {
    let messages = payload
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("agent response has no messages"))?;

    let mut reply = AgentReply::default();
    let mut texts: Vec<&str> = Vec::new();

    for message in messages {
        let role = message.get("role").and_then(Value::as_str);
        let kind = message.get("message_type").and_then(Value::as_str);

        if kind == Some("tool_call_message") {
            if let Some(call) = message.get("tool_call") {
                reply.tool_calls.extend(tool_invocation(call)?);
            }
        }
        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                reply.tool_calls.extend(tool_invocation(call)?);
            }
        }

        if role == Some("assistant") || kind == Some("assistant_message") {
            if let Some(content) = message.get("content").and_then(Value::as_str) {
                if !content.trim().is_empty() {
                    texts.push(content);
                }
            }
        }
    }

    reply.text = texts.join("\n").trim().to_string();
    reply.tokens_used = payload
        .pointer("/usage/total_tokens")
        .and_then(Value::as_u64)
        .and_then(|tokens| u32::try_from(tokens).ok());
    Ok(reply)
}

#[async_trait]
impl AgentMemoryClient for HttpAgentMemoryClient {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<String, CollaboratorError> {
        let payload = send_json(
            Self::SERVICE,
            self.client
                .post(format!("{}/v1/agents", self.base_url))
                .bearer_auth(self.api_key.expose_secret())
                .json(&create_agent_body(spec)),
        )
        .await?;
        parse_agent_id(&payload)
    }

    async fn send_message(
        &self,
        agent_id: &str,
        message: &str,
    ) -> Result<AgentReply, CollaboratorError> {
        let payload = send_json(
            Self::SERVICE,
            self.client
                .post(format!("{}/v1/agents/{agent_id}/messages", self.base_url))
                .bearer_auth(self.api_key.expose_secret())
                .json(&json!({ "messages": [{ "role": "user", "content": message }] })),
        )
        .await?;
        parse_agent_reply(&payload)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        create_agent_body, parse_agent_id, parse_agent_reply, AgentSpec, MemoryBlock,
        ToolInvocation, PRODUCER_TERMS_BLOCK,
    };
    use crate::llm::CollaboratorError;

    #[test]
    fn create_body_carries_memory_blocks() {
        let spec = AgentSpec {
            name: "en_negotiator_conv-123".to_string(),
            model: "model".to_string(),
            embedding: "embedding".to_string(),
            system: "system prompt".to_string(),
            memory_blocks: vec![MemoryBlock::new(PRODUCER_TERMS_BLOCK, "{}")],
        };

        let body = create_agent_body(&spec);
        assert_eq!(body["memory_blocks"][0]["label"], "producer_terms");
        assert_eq!(body["system"], "system prompt");
        assert_eq!(spec.block(PRODUCER_TERMS_BLOCK).map(|block| block.value.as_str()), Some("{}"));
    }

    #[test]
    fn agent_id_is_required() {
        assert_eq!(parse_agent_id(&json!({ "id": "agent-42" })), Ok("agent-42".to_string()));
        assert!(matches!(
            parse_agent_id(&json!({})),
            Err(CollaboratorError::MalformedPayload { service: "agent_memory", .. })
        ));
    }

    #[test]
    fn reply_collects_text_and_every_tool_call_shape() {
        let reply = parse_agent_reply(&json!({
            "messages": [
                {
                    "role": "assistant",
                    "content": "Let me price that.",
                    "tool_calls": [
                        {
                            "function": {
                                "name": "calculate_license_price",
                                "arguments": "{\"usageRights\":[\"YOUTUBE\"]}"
                            }
                        },
                        { "name": "validate_rights", "arguments": { "usageRights": ["FILM"] } }
                    ]
                },
                {
                    "message_type": "tool_call_message",
                    "tool_call": { "name": "validate_price", "arguments": "{\"price\": 60}" }
                },
                { "message_type": "assistant_message", "content": "That comes to $60." }
            ],
            "usage": { "total_tokens": 321 }
        }))
        .expect("reply should parse");

        assert_eq!(reply.text, "Let me price that.\nThat comes to $60.");
        assert_eq!(
            reply.tool_calls,
            vec![
                ToolInvocation::new(
                    "calculate_license_price",
                    json!({ "usageRights": ["YOUTUBE"] })
                ),
                ToolInvocation::new("validate_rights", json!({ "usageRights": ["FILM"] })),
                ToolInvocation::new("validate_price", json!({ "price": 60 })),
            ]
        );
        assert_eq!(reply.tokens_used, Some(321));
    }

    #[test]
    fn undecodable_tool_arguments_are_malformed() {
        let result = parse_agent_reply(&json!({
            "messages": [{
                "role": "assistant",
                "tool_calls": [{ "name": "validate_price", "arguments": "{price" }]
            }]
        }));
        assert!(matches!(result, Err(CollaboratorError::MalformedPayload { .. })));
    }
}
