use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use soundchain_core::config::NegotiationConfig;
use soundchain_core::domain::conversation::{ConversationState, Message};
use soundchain_core::domain::terms::{BaseTerms, NegotiationRequest, Territory, UsageRight};
use soundchain_core::flows::{
    reply_mentions_price, Stage, StageEngine, StageTransition, TurnSignals,
};
use soundchain_core::intent::{asks_question, classify_intent, needs_more_info, BuyerIntent};
use soundchain_core::language::{detect_language, Language};
use soundchain_core::licensing::contract::{ContractTerms, LicenseContract, DEFAULT_TERRITORY};
use soundchain_core::licensing::{DeterministicLicensingRuntime, LicensingRuntime};
use tracing::{debug, error, info, warn};

use crate::backend::{
    extract_final_terms, BackendKind, BackendRequest, NegotiationBackend, RawReply, ToolMode,
};
use crate::conversation::infer_from_text;
use crate::guardrails::{GuardrailIntent, GuardrailPolicy};
use crate::llm::{CollaboratorError, LlmClient};
use crate::prompts::DEFAULT_PRODUCER;
use crate::tools::{
    ToolCallRecord, ToolRegistry, CALCULATE_PRICE, GENERATE_CONTRACT, VALIDATE_PRICE,
};

const EMPTY_REPLY: &str = "No response generated";

/// One buyer turn as handed to the orchestrator.
#[derive(Clone, Debug)]
pub struct NegotiationTurn<'a> {
    /// The conversation as it stood before this turn.
    pub state: &'a ConversationState,
    pub user_message: &'a str,
    pub base_terms: &'a BaseTerms,
    pub producer_name: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NegotiationOutcome {
    pub backend: BackendKind,
    pub message: String,
    pub contract: Option<LicenseContract>,
    /// `None` for backends that do not branch on language.
    pub detected_language: Option<Language>,
    pub stage: Option<Stage>,
    pub transition: Option<StageTransition>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub needs_more_info: Option<bool>,
    pub intent: BuyerIntent,
    pub price_floor_violation: bool,
    pub agent_handle: Option<String>,
    pub tokens_used: Option<u32>,
    /// The conversation after this turn, to be re-submitted by the caller.
    pub state: ConversationState,
}

/// Terms read back from a finished transcript, and the contract drafted from them.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalTermsOutcome {
    /// `None` when the service did not return a usable terms object.
    pub terms: Option<ContractTerms>,
    pub contract: Option<LicenseContract>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub price_floor_violation: bool,
}

#[derive(Debug, Default)]
struct ToolPhase {
    tool_calls: Vec<ToolCallRecord>,
    contract: Option<LicenseContract>,
}

impl ToolPhase {
    fn pricing_ran(&self) -> bool {
        self.tool_calls.iter().any(|record| record.resolves_to(CALCULATE_PRICE))
    }
}

/// Shared layer behind every backend: tool execution, floor checks, contract
/// generation and stage inference all happen here, never in a backend.
pub struct NegotiationOrchestrator {
    licensing: Arc<dyn LicensingRuntime>,
    stage_engine: StageEngine,
    guardrails: GuardrailPolicy,
}

impl Default for NegotiationOrchestrator {
    fn default() -> Self {
        Self::new(Arc::new(DeterministicLicensingRuntime::default()), GuardrailPolicy::default())
    }
}

impl NegotiationOrchestrator {
    pub fn new(licensing: Arc<dyn LicensingRuntime>, guardrails: GuardrailPolicy) -> Self {
        Self { licensing, stage_engine: StageEngine::new(), guardrails }
    }

    pub fn from_config(negotiation: &NegotiationConfig) -> Self {
        Self::new(
            Arc::new(DeterministicLicensingRuntime::default()),
            GuardrailPolicy::new(negotiation.enforce_price_floor),
        )
    }

    pub fn licensing(&self) -> &Arc<dyn LicensingRuntime> {
        &self.licensing
    }

    /// Runs one turn. Collaborator failures are returned as-is and never retried.
    pub async fn negotiate(
        &self,
        backend: &dyn NegotiationBackend,
        turn: NegotiationTurn<'_>,
    ) -> Result<NegotiationOutcome, CollaboratorError> {
        let state = turn.state;
        let kind = backend.kind();
        let mode = backend.tool_mode();
        let language = detect_language(turn.user_message);

        info!(
            event_name = "negotiation.turn_started",
            conversation_id = %state.conversation_id,
            backend = kind.as_str(),
            stage = state.stage.as_str(),
            language = language.code(),
            "negotiation turn started"
        );

        let request = BackendRequest {
            conversation_id: &state.conversation_id,
            producer_name: turn.producer_name.unwrap_or(DEFAULT_PRODUCER),
            user_message: turn.user_message,
            history: &state.history,
            base_terms: turn.base_terms,
            language,
            agent_handle: state.agent_handle.as_deref(),
        };

        let raw = backend.respond(&request).await.map_err(|err| {
            error!(
                event_name = "negotiation.collaborator_failed",
                conversation_id = %state.conversation_id,
                backend = kind.as_str(),
                error = %err,
                "negotiation backend failed"
            );
            err
        })?;

        let message = match raw.text.trim() {
            "" if mode == ToolMode::Structured => EMPTY_REPLY.to_string(),
            text => text.to_string(),
        };
        let intent = classify_intent(turn.user_message);

        let mut phase = match mode {
            ToolMode::Structured => self.run_structured(&raw, turn.base_terms).await,
            ToolMode::InferFromText => self.run_inferred(&message, &turn),
            ToolMode::None => ToolPhase::default(),
        };

        let price_floor_violation =
            self.check_price_floor(&mut phase, &state.conversation_id, turn.base_terms);

        let more_info = match mode {
            ToolMode::Structured => Some(needs_more_info(&message)),
            ToolMode::InferFromText => Some(asks_question(&message)),
            ToolMode::None => None,
        };
        let transition = mode.stage_policy().map(|policy| {
            let signals = TurnSignals {
                contract_produced: phase.contract.is_some(),
                pricing_tool_ran: phase.pricing_ran(),
                reply_mentions_price: reply_mentions_price(&message),
                needs_more_info: more_info.unwrap_or(false),
                intent: Some(intent),
            };
            self.stage_engine.advance(state.stage, &signals, policy)
        });

        if let Some(transition) = transition.as_ref().filter(|transition| transition.changed()) {
            debug!(
                event_name = "negotiation.stage_changed",
                conversation_id = %state.conversation_id,
                backend = kind.as_str(),
                from = transition.from.as_str(),
                stage = transition.to.as_str(),
                regressed = transition.regressed,
                "negotiation stage changed"
            );
        }

        let mut next_state = state.clone();
        next_state.record_turn(turn.user_message, &message);
        if let Some(transition) = &transition {
            next_state.stage = transition.to;
        }
        if raw.agent_handle.is_some() {
            next_state.agent_handle = raw.agent_handle.clone();
        }
        let detected_language = (mode != ToolMode::None).then_some(language);
        if detected_language.is_some() {
            next_state.detected_language = detected_language;
        }

        Ok(NegotiationOutcome {
            backend: kind,
            message,
            contract: phase.contract,
            detected_language,
            stage: transition.as_ref().map(|transition| transition.to),
            transition,
            tool_calls: phase.tool_calls,
            needs_more_info: more_info,
            intent,
            price_floor_violation,
            agent_handle: next_state.agent_handle.clone(),
            tokens_used: raw.tokens_used,
            state: next_state,
        })
    }

    /// Reads the agreed terms out of `history` and drafts a contract from them,
    /// subject to the same floor check as a negotiated turn.
    pub async fn finalize_from_transcript(
        &self,
        client: &dyn LlmClient,
        conversation_id: &str,
        history: &[Message],
        base_terms: &BaseTerms,
    ) -> Result<FinalTermsOutcome, CollaboratorError> {
        let Some(terms) = extract_final_terms(client, history).await? else {
            info!(
                event_name = "negotiation.final_terms_unreadable",
                conversation_id,
                service = client.service(),
                "final terms could not be read from the transcript"
            );
            return Ok(FinalTermsOutcome {
                terms: None,
                contract: None,
                tool_calls: Vec::new(),
                price_floor_violation: false,
            });
        };

        let contract = self.licensing.generate_contract(&terms, Some(base_terms.min_price));
        let mut phase = ToolPhase::default();
        phase.tool_calls.push(ToolCallRecord {
            tool: GENERATE_CONTRACT.to_string(),
            arguments: serde_json::to_value(&terms).unwrap_or_default(),
            result: serde_json::to_value(&contract).unwrap_or_default(),
            resolved: Some(GENERATE_CONTRACT),
        });
        phase.contract = Some(contract);
        let price_floor_violation = self.check_price_floor(&mut phase, conversation_id, base_terms);

        Ok(FinalTermsOutcome {
            terms: Some(terms),
            contract: phase.contract,
            tool_calls: phase.tool_calls,
            price_floor_violation,
        })
    }

    /// Executes every tool the agent named, locally, in order.
    async fn run_structured(&self, raw: &RawReply, base_terms: &BaseTerms) -> ToolPhase {
        let registry = ToolRegistry::for_terms(self.licensing.clone(), base_terms);
        let mut phase = ToolPhase::default();

        for invocation in &raw.tool_calls {
            let record = registry.invoke(&invocation.name, invocation.arguments.clone()).await;
            if record.resolves_to(GENERATE_CONTRACT) && !record.is_error() {
                phase.contract = serde_json::from_value(record.result.clone()).ok();
            }
            phase.tool_calls.push(record);
        }
        phase
    }

    /// Re-prices any quoted amount with the engine and drafts a contract when the buyer agreed.
    fn run_inferred(&self, message: &str, turn: &NegotiationTurn<'_>) -> ToolPhase {
        let inference = infer_from_text(message, turn.user_message, turn.state);
        let mut phase = ToolPhase::default();
        if inference.quoted_price.is_none() {
            return phase;
        }

        let request = NegotiationRequest {
            usage_rights: inference.usage_rights.clone(),
            exclusivity: false,
            territory: Territory::Worldwide,
            duration_months: None,
        };
        let rights: Vec<String> =
            inference.usage_rights.iter().map(UsageRight::as_str).map(str::to_string).collect();
        let min_price = turn.base_terms.min_price;
        let breakdown = self.licensing.calculate_price(min_price, &request);
        phase.tool_calls.push(ToolCallRecord {
            tool: CALCULATE_PRICE.to_string(),
            arguments: json!({
                "basePrice": decimal_value(min_price),
                "usageRights": rights,
                "exclusivity": false,
                "territory": DEFAULT_TERRITORY,
            }),
            result: serde_json::to_value(&breakdown).unwrap_or_default(),
            resolved: Some(CALCULATE_PRICE),
        });

        if inference.buyer_agreed() {
            let terms = ContractTerms {
                price: Some(breakdown.final_price),
                usage_rights: rights,
                exclusivity: Some(false),
                territory: Some(DEFAULT_TERRITORY.to_string()),
                duration_months: None,
                attribution: Some(true),
                ..ContractTerms::default()
            };
            let contract = self.licensing.generate_contract(&terms, Some(min_price));
            phase.tool_calls.push(ToolCallRecord {
                tool: GENERATE_CONTRACT.to_string(),
                arguments: serde_json::to_value(&terms).unwrap_or_default(),
                result: serde_json::to_value(&contract).unwrap_or_default(),
                resolved: Some(GENERATE_CONTRACT),
            });
            phase.contract = Some(contract);
        }
        phase
    }

    /// Validates any contract against the floor before it leaves the orchestrator.
    /// Returns whether the price was below the floor.
    fn check_price_floor(
        &self,
        phase: &mut ToolPhase,
        conversation_id: &str,
        base_terms: &BaseTerms,
    ) -> bool {
        let Some(price) = phase.contract.as_ref().map(|contract| contract.price) else {
            return false;
        };

        let minimum = base_terms.min_price;
        let validation = self.licensing.validate_price(price, base_terms);
        phase.tool_calls.push(ToolCallRecord {
            tool: VALIDATE_PRICE.to_string(),
            arguments: json!({ "offeredPrice": decimal_value(price) }),
            result: serde_json::to_value(&validation).unwrap_or_default(),
            resolved: Some(VALIDATE_PRICE),
        });

        let intent = GuardrailIntent::EmitContract { price, minimum, validation };
        let decision = self.guardrails.evaluate(&intent);
        if !decision.flags_violation() {
            return false;
        }

        warn!(
            event_name = "negotiation.price_floor_violation",
            conversation_id,
            action = intent.action_key(),
            price = %price,
            minimum = %minimum,
            withheld = decision.withholds_contract(),
            "contract price below producer minimum"
        );
        if decision.withholds_contract() {
            phase.contract = None;
        }
        true
    }
}

fn decimal_value(amount: Decimal) -> Value {
    amount.to_f64().map(|value| json!(value)).unwrap_or(Value::Null)
}
