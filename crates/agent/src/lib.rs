//! Negotiation runtime for SoundChain.
//!
//! Three text-generation backends sit behind [`backend::NegotiationBackend`]:
//! a fast completion path that is parsed as free text, a persistent agent with
//! structured tool calls, and a single-shot fallback. Whatever the backend, the
//! [`runtime::NegotiationOrchestrator`] executes tools locally against the
//! deterministic licensing engine, checks the producer's price floor and
//! derives the negotiation stage.
//!
//! The language model never sets prices. Every figure in a tool result or a
//! contract comes from `soundchain-core`.

pub mod backend;
pub mod conversation;
pub mod guardrails;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod runtime;
pub mod tools;

pub use backend::{
    AgentMemoryBackend, BackendKind, BackendRequest, FastPathBackend, NegotiationBackend,
    RawReply, SingleAgentBackend, ToolMode,
};
pub use llm::{CollaboratorError, FastCompletionClient, LlmClient, MessagesClient};
pub use memory::{AgentMemoryClient, HttpAgentMemoryClient};
pub use runtime::{FinalTermsOutcome, NegotiationOrchestrator, NegotiationOutcome, NegotiationTurn};
pub use tools::{ToolCallRecord, ToolRegistry};
