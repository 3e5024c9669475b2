use std::sync::Arc;

use soundchain_agent::{
    AgentMemoryBackend, CollaboratorError, FastCompletionClient, FastPathBackend,
    HttpAgentMemoryClient, LlmClient, MessagesClient, NegotiationBackend,
    NegotiationOrchestrator, SingleAgentBackend,
};
use soundchain_core::config::AppConfig;
use thiserror::Error;
use tracing::info;

/// Caller-supplied backend selection flags of one negotiation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendFlags {
    pub use_fast: bool,
    pub use_agent_memory: bool,
    pub use_improved_system: bool,
}

impl Default for BackendFlags {
    fn default() -> Self {
        Self { use_fast: false, use_agent_memory: true, use_improved_system: true }
    }
}

/// The configured text-generation backends. `None` means no credentials.
#[derive(Clone, Default)]
pub struct Backends {
    pub fast_path: Option<Arc<dyn NegotiationBackend>>,
    pub agent_memory: Option<Arc<dyn NegotiationBackend>>,
    pub single_agent: Option<Arc<dyn NegotiationBackend>>,
    /// JSON-mode completion client used to read final terms back from a transcript.
    pub terms_client: Option<Arc<dyn LlmClient>>,
}

/// A missing key leaves the backend out; any other client failure aborts startup.
fn configured<C>(built: Result<C, CollaboratorError>) -> Result<Option<C>, CollaboratorError> {
    match built {
        Ok(client) => Ok(Some(client)),
        Err(CollaboratorError::NotConfigured(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

impl Backends {
    pub fn from_config(config: &AppConfig) -> Result<Self, CollaboratorError> {
        let terms_client = configured(FastCompletionClient::from_config(&config.fast_llm))?
            .map(|client| Arc::new(client) as Arc<dyn LlmClient>);
        let fast_path = terms_client.clone().map(|client| {
            Arc::new(FastPathBackend::new(client, &config.negotiation))
                as Arc<dyn NegotiationBackend>
        });
        let agent_memory =
            configured(HttpAgentMemoryClient::from_config(&config.agent_memory))?.map(|client| {
                Arc::new(AgentMemoryBackend::new(Arc::new(client), config))
                    as Arc<dyn NegotiationBackend>
            });
        let single_agent =
            configured(MessagesClient::from_config(&config.fallback_llm))?.map(|client| {
                Arc::new(SingleAgentBackend::new(Arc::new(client), config))
                    as Arc<dyn NegotiationBackend>
            });

        Ok(Self { fast_path, agent_memory, single_agent, terms_client })
    }

    /// Fast path first, then agent memory, then the single-agent fallback.
    pub fn select(
        &self,
        flags: BackendFlags,
    ) -> Result<&dyn NegotiationBackend, CollaboratorError> {
        if flags.use_fast {
            if let Some(backend) = &self.fast_path {
                return Ok(backend.as_ref());
            }
        }
        if flags.use_agent_memory && flags.use_improved_system {
            if let Some(backend) = &self.agent_memory {
                return Ok(backend.as_ref());
            }
        }
        self.single_agent
            .as_deref()
            .ok_or(CollaboratorError::NotConfigured(MessagesClient::SERVICE))
    }

    pub fn agent_memory_configured(&self) -> bool {
        self.agent_memory.is_some()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<NegotiationOrchestrator>,
    pub backends: Arc<Backends>,
}

impl AppState {
    pub fn new(config: AppConfig, backends: Backends) -> Self {
        let orchestrator = NegotiationOrchestrator::from_config(&config.negotiation);
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            backends: Arc::new(backends),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("backend client initialization failed: {0}")]
    Backend(#[from] CollaboratorError),
}

pub fn bootstrap(config: AppConfig) -> Result<AppState, BootstrapError> {
    let backends = Backends::from_config(&config)?;
    info!(
        event_name = "system.bootstrap.backends",
        correlation_id = "bootstrap",
        configured = ?config.configured_backends(),
        enforce_price_floor = config.negotiation.enforce_price_floor,
        "negotiation backends initialized"
    );
    Ok(AppState::new(config, backends))
}
