use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use soundchain_core::config::{AppConfig, NegotiationConfig};
use soundchain_core::domain::conversation::Message;
use soundchain_core::domain::terms::BaseTerms;
use soundchain_core::flows::states::StagePolicy;
use soundchain_core::language::Language;
use soundchain_core::licensing::contract::ContractTerms;
use soundchain_core::licensing::presets::{NegotiationExamples, UsagePackages};
use soundchain_core::licensing::pricing::PricingTable;
use tracing::debug;

use crate::llm::{CollaboratorError, CompletionRequest, LlmClient};
use crate::memory::{AgentMemoryClient, AgentSpec, ToolInvocation};
use crate::prompts::{
    agent_memory_prompt, fast_path_prompt, final_terms_prompt, memory_blocks, single_agent_prompt,
    PromptContext,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    FastPath,
    AgentMemory,
    SingleAgent,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastPath => "fast_path",
            Self::AgentMemory => "agent_memory",
            Self::SingleAgent => "single_agent",
        }
    }
}

/// How a backend's reply feeds the shared tool layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolMode {
    /// The collaborator names tools explicitly.
    Structured,
    /// Tool calls are inferred from the reply text.
    InferFromText,
    /// Plain text; no tools, stage or contract.
    None,
}

impl ToolMode {
    pub fn stage_policy(&self) -> Option<StagePolicy> {
        match self {
            Self::Structured => Some(StagePolicy::QuestionSignals),
            Self::InferFromText => Some(StagePolicy::TextSignals),
            Self::None => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BackendRequest<'a> {
    pub conversation_id: &'a str,
    pub producer_name: &'a str,
    pub user_message: &'a str,
    pub history: &'a [Message],
    pub base_terms: &'a BaseTerms,
    pub language: Language,
    pub agent_handle: Option<&'a str>,
}

impl BackendRequest<'_> {
    fn prompt_context(&self) -> PromptContext<'_> {
        PromptContext { producer_name: self.producer_name, base_terms: self.base_terms }
    }

    /// `system` followed by the history and the new buyer message.
    fn transcript(&self, system: String) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(self.user_message));
        messages
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawReply {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub agent_handle: Option<String>,
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait NegotiationBackend: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn tool_mode(&self) -> ToolMode;
    async fn respond(&self, request: &BackendRequest<'_>) -> Result<RawReply, CollaboratorError>;
}

pub struct FastPathBackend {
    client: Arc<dyn LlmClient>,
    temperature: f32,
    pricing_table: PricingTable,
}

impl FastPathBackend {
    pub fn new(client: Arc<dyn LlmClient>, negotiation: &NegotiationConfig) -> Self {
        Self {
            client,
            temperature: negotiation.temperature,
            pricing_table: PricingTable::default(),
        }
    }
}

#[async_trait]
impl NegotiationBackend for FastPathBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FastPath
    }

    fn tool_mode(&self) -> ToolMode {
        ToolMode::InferFromText
    }

    async fn respond(&self, request: &BackendRequest<'_>) -> Result<RawReply, CollaboratorError> {
        let system =
            fast_path_prompt(&request.prompt_context(), request.language, &self.pricing_table);
        let completion = self
            .client
            .complete(&CompletionRequest::new(request.transcript(system), self.temperature))
            .await?;

        Ok(RawReply {
            text: completion.text,
            tokens_used: completion.tokens_used,
            ..RawReply::default()
        })
    }
}

pub struct AgentMemoryBackend {
    client: Arc<dyn AgentMemoryClient>,
    model: String,
    embedding: String,
    packages: UsagePackages,
    examples: NegotiationExamples,
}

impl AgentMemoryBackend {
    pub fn new(client: Arc<dyn AgentMemoryClient>, config: &AppConfig) -> Self {
        Self {
            client,
            model: config.agent_memory.model.clone(),
            embedding: config.agent_memory.embedding.clone(),
            packages: UsagePackages::default(),
            examples: NegotiationExamples::default(),
        }
    }

    pub fn agent_spec(&self, request: &BackendRequest<'_>) -> AgentSpec {
        let prefix = match request.language {
            Language::Vietnamese => "vn",
            Language::English => "en",
        };
        let short_id: String = request.conversation_id.chars().take(8).collect();

        AgentSpec {
            name: format!("{prefix}_negotiator_{short_id}"),
            model: self.model.clone(),
            embedding: self.embedding.clone(),
            system: agent_memory_prompt(
                &request.prompt_context(),
                request.language,
                &self.packages,
            ),
            memory_blocks: memory_blocks(request.base_terms, &self.examples),
        }
    }
}

#[async_trait]
impl NegotiationBackend for AgentMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::AgentMemory
    }

    fn tool_mode(&self) -> ToolMode {
        ToolMode::Structured
    }

    async fn respond(&self, request: &BackendRequest<'_>) -> Result<RawReply, CollaboratorError> {
        let agent_id = match request.agent_handle.filter(|handle| !handle.trim().is_empty()) {
            Some(handle) => handle.to_string(),
            None => {
                let agent_id = self.client.create_agent(&self.agent_spec(request)).await?;
                debug!(
                    event_name = "agent_memory.agent_created",
                    conversation_id = request.conversation_id,
                    agent_id = %agent_id,
                    "created negotiation agent"
                );
                agent_id
            }
        };

        let reply = self.client.send_message(&agent_id, request.user_message).await?;
        Ok(RawReply {
            text: reply.text,
            tool_calls: reply.tool_calls,
            agent_handle: Some(agent_id),
            tokens_used: reply.tokens_used,
        })
    }
}

pub struct SingleAgentBackend {
    client: Arc<dyn LlmClient>,
    temperature: f32,
    max_tokens: u32,
}

impl SingleAgentBackend {
    pub fn new(client: Arc<dyn LlmClient>, config: &AppConfig) -> Self {
        Self {
            client,
            temperature: config.negotiation.temperature,
            max_tokens: config.fallback_llm.max_tokens,
        }
    }
}

#[async_trait]
impl NegotiationBackend for SingleAgentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SingleAgent
    }

    fn tool_mode(&self) -> ToolMode {
        ToolMode::None
    }

    async fn respond(&self, request: &BackendRequest<'_>) -> Result<RawReply, CollaboratorError> {
        let system = single_agent_prompt(request.base_terms, request.history.len());
        let completion = self
            .client
            .complete(
                &CompletionRequest::new(request.transcript(system), self.temperature)
                    .with_max_tokens(self.max_tokens),
            )
            .await?;

        Ok(RawReply {
            text: completion.text,
            tokens_used: completion.tokens_used,
            ..RawReply::default()
        })
    }
}

/// Asks a completion service in JSON mode for the terms agreed in `history`.
/// Returns `None` when the reply is not a usable terms object.
pub async fn extract_final_terms(
    client: &dyn LlmClient,
    history: &[Message],
) -> Result<Option<ContractTerms>, CollaboratorError> {
    let transcript = history
        .iter()
        .map(|message| format!("{}: {}", message.role.as_str(), message.content))
        .collect::<Vec<_>>()
        .join("\n");
    let request = CompletionRequest::new(vec![Message::user(final_terms_prompt(&transcript))], 0.0)
        .with_max_tokens(512)
        .with_json_mode();

    let completion = client.complete(&request).await?;
    Ok(serde_json::from_str(completion.text.trim()).ok())
}
