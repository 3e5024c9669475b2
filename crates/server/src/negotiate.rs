use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::post,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use soundchain_agent::{
    BackendKind, CollaboratorError, FastCompletionClient, NegotiationTurn, ToolCallRecord,
};
use soundchain_core::domain::conversation::{ConversationState, Message};
use soundchain_core::domain::terms::{BaseTerms, UsageRight};
use soundchain_core::errors::ApplicationError;
use soundchain_core::flows::Stage;
use soundchain_core::language::Language;
use soundchain_core::licensing::contract::{ContractTerms, LicenseContract, DEFAULT_TERRITORY};
use tracing::info;

use crate::bootstrap::{AppState, BackendFlags};
use crate::error::{api_error, ApiError};

const ROUTE: &str = "/api/negotiate";
const FINAL_TERMS_ROUTE: &str = "/api/negotiate/final-terms";
const MISSING_FIELDS: &str = "Missing required fields";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub cultural_context: Option<String>,
}

/// Base terms as posted; omitted fields fall back to configured defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseTermsInput {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub min_price: Option<Decimal>,
    pub allowed_usage_rights: Option<Vec<UsageRight>>,
    pub exclusivity_available: Option<bool>,
    pub territory: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateRequest {
    pub conversation_id: Option<String>,
    pub track_id: Option<String>,
    #[serde(default)]
    pub track_metadata: Option<TrackMetadata>,
    pub base_terms: Option<BaseTermsInput>,
    pub user_message: Option<String>,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, alias = "agentId")]
    pub existing_agent_id: Option<String>,
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(default = "default_true")]
    pub use_letta: bool,
    #[serde(default = "default_true")]
    pub use_improved_system: bool,
    #[serde(default)]
    pub use_groq: bool,
}

impl NegotiateRequest {
    fn flags(&self) -> BackendFlags {
        BackendFlags {
            use_fast: self.use_groq,
            use_agent_memory: self.use_letta,
            use_improved_system: self.use_improved_system,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<LicenseContract>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_more_info: Option<bool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub price_floor_violation: bool,
    pub conversation_id: String,
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_multi_agent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improved_system: Option<bool>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalTermsRequest {
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub history: Vec<Message>,
    pub base_terms: Option<BaseTermsInput>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalTermsResponse {
    pub success: bool,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<ContractTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<LicenseContract>,
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub price_floor_violation: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AgentStatusQuery {
    #[serde(rename = "agentId")]
    pub agent_id: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(ROUTE, post(negotiate).get(agent_status))
        .route(FINAL_TERMS_ROUTE, post(final_terms))
        .with_state(state)
}

fn invalid_body(route: &'static str, rejection: JsonRejection) -> ApiError {
    api_error(
        route,
        ApplicationError::Validation(format!("Invalid request body: {}", rejection.body_text())),
    )
}

fn collaborator_failure(route: &'static str, err: CollaboratorError) -> ApiError {
    api_error(route, ApplicationError::Integration(err.to_string()))
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn resolve_base_terms(
    input: &BaseTermsInput,
    state: &AppState,
) -> Result<BaseTerms, ApplicationError> {
    let min_price = input.min_price.ok_or_else(|| {
        ApplicationError::Validation(format!("{MISSING_FIELDS}: baseTerms.minPrice"))
    })?;
    if min_price.is_sign_negative() {
        return Err(ApplicationError::Validation(
            "baseTerms.minPrice must not be negative".to_string(),
        ));
    }

    Ok(BaseTerms {
        min_price,
        allowed_usage_rights: input
            .allowed_usage_rights
            .clone()
            .unwrap_or_else(|| state.config.negotiation.default_allowed_rights.clone()),
        exclusivity_available: input.exclusivity_available.unwrap_or(true),
        territory: input
            .territory
            .clone()
            .filter(|territory| !territory.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TERRITORY.to_string()),
    })
}

pub async fn negotiate(
    State(state): State<AppState>,
    payload: Result<Json<NegotiateRequest>, JsonRejection>,
) -> Result<Json<NegotiateResponse>, ApiError> {
    let started = Instant::now();
    let Json(request) = payload.map_err(|rejection| invalid_body(ROUTE, rejection))?;

    let (Some(conversation_id), Some(_track_id), Some(user_message), Some(terms_input)) = (
        required(request.conversation_id.as_deref()),
        required(request.track_id.as_deref()),
        required(request.user_message.as_deref()),
        request.base_terms.as_ref(),
    ) else {
        return Err(api_error(ROUTE, ApplicationError::Validation(MISSING_FIELDS.to_string())));
    };
    let base_terms =
        resolve_base_terms(terms_input, &state).map_err(|failure| api_error(ROUTE, failure))?;

    let backend =
        state.backends.select(request.flags()).map_err(|err| collaborator_failure(ROUTE, err))?;

    let mut conversation = ConversationState::new(conversation_id)
        .with_history(request.history.clone())
        .with_agent_handle(request.existing_agent_id.clone());
    conversation.stage = request.stage.unwrap_or_default();

    let producer_name =
        request.track_metadata.as_ref().and_then(|metadata| metadata.artist.as_deref());
    let outcome = state
        .orchestrator
        .negotiate(
            backend,
            NegotiationTurn {
                state: &conversation,
                user_message,
                base_terms: &base_terms,
                producer_name,
            },
        )
        .await
        .map_err(|err| collaborator_failure(ROUTE, err))?;

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        event_name = "negotiation.turn_completed",
        conversation_id,
        backend = outcome.backend.as_str(),
        stage = outcome.stage.map(|stage| stage.as_str()).unwrap_or("none"),
        contract = outcome.contract.is_some(),
        elapsed_ms,
        "negotiation turn completed"
    );

    let structured = outcome.backend != BackendKind::SingleAgent;
    let mut response = NegotiateResponse {
        success: true,
        message: outcome.message,
        contract: outcome.contract,
        detected_language: outcome.detected_language,
        stage: outcome.stage,
        tool_calls: structured.then_some(outcome.tool_calls),
        needs_more_info: outcome.needs_more_info,
        price_floor_violation: outcome.price_floor_violation,
        conversation_id: conversation_id.to_string(),
        backend: outcome.backend,
        response_time: None,
        agent_id: None,
        tokens_used: None,
        used_multi_agent: None,
        improved_system: None,
    };
    match outcome.backend {
        BackendKind::FastPath => response.response_time = Some(elapsed_ms),
        BackendKind::AgentMemory => {
            response.agent_id = outcome.agent_handle;
            response.used_multi_agent = Some(true);
            response.improved_system = Some(true);
        }
        BackendKind::SingleAgent => {
            response.tokens_used = outcome.tokens_used;
            response.used_multi_agent = Some(false);
        }
    }

    Ok(Json(response))
}

/// Reads the agreed terms of a finished conversation back through the fast
/// completion service and drafts the contract from them.
pub async fn final_terms(
    State(state): State<AppState>,
    payload: Result<Json<FinalTermsRequest>, JsonRejection>,
) -> Result<Json<FinalTermsResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| invalid_body(FINAL_TERMS_ROUTE, rejection))?;
    let (Some(conversation_id), Some(terms_input), false) = (
        required(request.conversation_id.as_deref()),
        request.base_terms.as_ref(),
        request.history.is_empty(),
    ) else {
        return Err(api_error(
            FINAL_TERMS_ROUTE,
            ApplicationError::Validation(format!(
                "{MISSING_FIELDS}: conversationId, history, baseTerms"
            )),
        ));
    };
    let base_terms = resolve_base_terms(terms_input, &state)
        .map_err(|failure| api_error(FINAL_TERMS_ROUTE, failure))?;

    let client = state.backends.terms_client.as_deref().ok_or_else(|| {
        collaborator_failure(
            FINAL_TERMS_ROUTE,
            CollaboratorError::NotConfigured(FastCompletionClient::SERVICE),
        )
    })?;
    let outcome = state
        .orchestrator
        .finalize_from_transcript(client, conversation_id, &request.history, &base_terms)
        .await
        .map_err(|err| collaborator_failure(FINAL_TERMS_ROUTE, err))?;

    info!(
        event_name = "negotiation.final_terms_drafted",
        conversation_id,
        terms_read = outcome.terms.is_some(),
        contract = outcome.contract.is_some(),
        price_floor_violation = outcome.price_floor_violation,
        "final terms drafted"
    );

    Ok(Json(FinalTermsResponse {
        success: true,
        conversation_id: conversation_id.to_string(),
        terms: outcome.terms,
        contract: outcome.contract,
        tool_calls: outcome.tool_calls,
        price_floor_violation: outcome.price_floor_violation,
    }))
}

pub async fn agent_status(
    State(state): State<AppState>,
    Query(query): Query<AgentStatusQuery>,
) -> Json<Value> {
    let configured = state.backends.agent_memory_configured();
    match required(query.agent_id.as_deref()) {
        None => Json(json!({
            "agentMemoryConfigured": configured,
            "message": "Multi-agent system status",
        })),
        Some(agent_id) => Json(json!({
            "agentId": agent_id,
            "status": "active",
            "agentMemoryConfigured": configured,
        })),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use serde_json::{json, Value};
    use soundchain_agent::llm::{Completion, CompletionRequest};
    use soundchain_agent::memory::{AgentMemoryClient, AgentReply, AgentSpec, ToolInvocation};
    use soundchain_agent::{
        AgentMemoryBackend, CollaboratorError, FastPathBackend, LlmClient, NegotiationBackend,
        SingleAgentBackend,
    };
    use soundchain_core::config::AppConfig;
    use soundchain_core::flows::Stage;
    use tower::ServiceExt;

    use super::{negotiate, router};
    use crate::bootstrap::{AppState, Backends};

    struct ScriptedLlm {
        replies: Mutex<Vec<Result<String, CollaboratorError>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, CollaboratorError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies) })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn service(&self) -> &'static str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<Completion, CollaboratorError> {
            let next = self.replies.lock().ok().and_then(|mut replies| {
                (!replies.is_empty()).then(|| replies.remove(0))
            });
            next.unwrap_or_else(|| Ok(String::new()))
                .map(|text| Completion { text, tokens_used: Some(42) })
        }
    }

    struct CountingMemory;

    #[async_trait]
    impl AgentMemoryClient for CountingMemory {
        async fn create_agent(&self, _spec: &AgentSpec) -> Result<String, CollaboratorError> {
            Ok("agent-fresh".to_string())
        }

        async fn send_message(
            &self,
            _agent_id: &str,
            _message: &str,
        ) -> Result<AgentReply, CollaboratorError> {
            Ok(AgentReply {
                text: "What will you use it for?".to_string(),
                tool_calls: vec![ToolInvocation::new("mint_nft", json!({}))],
                tokens_used: None,
            })
        }
    }

    fn fast_state(llm: Arc<ScriptedLlm>) -> AppState {
        let config = AppConfig::default();
        let backends = Backends {
            fast_path: Some(Arc::new(FastPathBackend::new(llm.clone(), &config.negotiation))
                as Arc<dyn NegotiationBackend>),
            terms_client: Some(llm as Arc<dyn LlmClient>),
            ..Backends::default()
        };
        AppState::new(config, backends)
    }

    fn body(overrides: Value) -> Value {
        let mut body = json!({
            "conversationId": "conv-42",
            "trackId": "track-1",
            "trackMetadata": { "title": "Sông Quê", "artist": "Minh" },
            "baseTerms": {
                "minPrice": 50,
                "allowedUsageRights": ["YOUTUBE", "COMMERCIAL", "STREAMING"],
                "exclusivityAvailable": false,
                "territory": "worldwide"
            },
            "userMessage": "I want to use this for my monetized YouTube channel",
            "history": [],
            "useGroq": true
        });
        if let (Some(target), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        body
    }

    async fn call(state: AppState, payload: Value) -> (StatusCode, Value) {
        call_at(state, "/api/negotiate", payload).await
    }

    async fn call_at(state: AppState, uri: &str, payload: Value) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        (status, serde_json::from_slice(&bytes).expect("body should be json"))
    }

    #[tokio::test]
    async fn fast_path_quotes_then_finalizes_on_agreement() {
        let llm = ScriptedLlm::new(vec![
            Ok("For monetized YouTube: $127.50 worldwide. Does that work for you?".to_string()),
            Ok("Great, I'll prepare the license now.".to_string()),
        ]);
        let state = fast_state(llm);

        let (status, first) = call(state.clone(), body(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["success"], json!(true));
        assert_eq!(first["backend"], json!("fast_path"));
        assert_eq!(first["stage"], json!("proposing"));
        assert_eq!(first["detectedLanguage"], json!("en"));
        assert!(first.get("contract").is_none());
        assert_eq!(first["toolCalls"][0]["tool"], json!("calculate_license_price"));
        assert!(first["responseTime"].is_u64());

        let (status, second) = call(
            state,
            body(json!({
                "userMessage": "yes",
                "stage": "proposing",
                "history": [
                    { "role": "user", "content": "I want this for my monetized YouTube channel" },
                    { "role": "assistant", "content": first["message"] }
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["stage"], json!("finalizing"));
        assert_eq!(second["contract"]["price"], json!(127.5));
        let rights = second["contract"]["usageRights"].as_array().cloned().unwrap_or_default();
        assert!(rights.contains(&json!("YOUTUBE")));
        assert!(rights.contains(&json!("COMMERCIAL")));
    }

    #[tokio::test]
    async fn missing_required_fields_are_rejected_before_any_backend() {
        let llm = ScriptedLlm::new(vec![Err(CollaboratorError::Transport {
            service: "scripted",
            message: "must not be called".to_string(),
        })]);

        for field in ["conversationId", "trackId", "userMessage", "baseTerms"] {
            let mut payload = body(json!({}));
            if let Some(object) = payload.as_object_mut() {
                object.remove(field);
            }
            let (status, response) = call(fast_state(llm.clone()), payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "missing {field}");
            assert_eq!(response["error"], json!("Missing required fields"));
        }

        let (status, _) = call(fast_state(llm), body(json!({ "userMessage": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let response = router(fast_state(ScriptedLlm::new(Vec::new())))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/negotiate")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn collaborator_failure_surfaces_as_generic_error() {
        let llm = ScriptedLlm::new(vec![Err(CollaboratorError::Status {
            service: "fast_llm",
            status: 429,
            body: "rate limited".to_string(),
        })]);

        let (status, response) = call(fast_state(llm), body(json!({}))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response["error"], json!("Failed to process negotiation"));
        assert!(response["details"].as_str().unwrap_or_default().contains("429"));
        assert!(response["correlationId"].is_string());
    }

    #[tokio::test]
    async fn unconfigured_fallback_is_reported() {
        let state = AppState::new(AppConfig::default(), Backends::default());

        let (status, response) = call(state, body(json!({ "useGroq": false }))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response["details"], json!("fallback_llm is not configured"));
    }

    #[tokio::test]
    async fn agent_memory_turn_returns_agent_id_and_inline_tool_errors() {
        let config = AppConfig::default();
        let backends = Backends {
            agent_memory: Some(Arc::new(AgentMemoryBackend::new(Arc::new(CountingMemory), &config))
                as Arc<dyn NegotiationBackend>),
            ..Backends::default()
        };
        let state = AppState::new(config, backends);

        let (status, response) = call(state, body(json!({ "useGroq": false }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["backend"], json!("agent_memory"));
        assert_eq!(response["agentId"], json!("agent-fresh"));
        assert_eq!(response["usedMultiAgent"], json!(true));
        assert_eq!(response["needsMoreInfo"], json!(true));
        assert_eq!(response["stage"], json!("understanding"));
        assert_eq!(
            response["toolCalls"][0]["result"],
            json!({ "error": "Unknown tool: mint_nft" })
        );
    }

    #[tokio::test]
    async fn single_agent_reports_tokens_without_stage() {
        let config = AppConfig::default();
        let llm = ScriptedLlm::new(vec![Ok("Chào bạn!".to_string())]);
        let backends = Backends {
            single_agent: Some(Arc::new(SingleAgentBackend::new(llm, &config))
                as Arc<dyn NegotiationBackend>),
            ..Backends::default()
        };
        let state = AppState::new(config, backends);
        let payload = body(json!({ "useGroq": false, "useImprovedSystem": false }));
        let request = serde_json::from_value(payload).expect("request should deserialize");

        let Json(response) = negotiate(State(state), Ok(Json(request)))
            .await
            .expect("single agent turn should succeed");

        assert_eq!(response.message, "Chào bạn!");
        assert_eq!(response.tokens_used, Some(42));
        assert_eq!(response.used_multi_agent, Some(false));
        assert!(response.stage.is_none());
        assert!(response.tool_calls.is_none());
        assert!(response.contract.is_none());
    }

    #[tokio::test]
    async fn stage_can_regress_from_the_submitted_stage() {
        let llm = ScriptedLlm::new(vec![Ok("Tell me more about your project?".to_string())]);
        let request = serde_json::from_value(body(json!({ "stage": "negotiating" })))
            .expect("request should deserialize");

        let Json(response) = negotiate(State(fast_state(llm)), Ok(Json(request)))
            .await
            .expect("fast path turn should succeed");

        assert_eq!(response.stage, Some(Stage::Understanding));
    }

    #[tokio::test]
    async fn agent_status_reports_configuration() {
        let state = AppState::new(AppConfig::default(), Backends::default());

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/negotiate?agentId=agent-9")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        let payload: Value = serde_json::from_slice(&bytes).expect("body should be json");

        assert_eq!(payload["agentId"], json!("agent-9"));
        assert_eq!(payload["status"], json!("active"));
        assert_eq!(payload["agentMemoryConfigured"], json!(false));

        let response = router(state)
            .oneshot(Request::builder().uri("/api/negotiate").body(Body::empty()).expect("request"))
            .await
            .expect("router should respond");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        let payload: Value = serde_json::from_slice(&bytes).expect("body should be json");
        assert_eq!(payload["message"], json!("Multi-agent system status"));
    }

    fn transcript_body(overrides: Value) -> Value {
        let mut body = json!({
            "conversationId": "conv-42",
            "history": [
                { "role": "user", "content": "I want this for my monetized YouTube channel" },
                { "role": "assistant", "content": "That comes to $127.50 worldwide. Deal?" },
                { "role": "user", "content": "yes" }
            ],
            "baseTerms": { "minPrice": 50 }
        });
        if let (Some(target), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        body
    }

    #[tokio::test]
    async fn final_terms_draft_a_contract_from_the_transcript() {
        let reply = json!({
            "price": 127.5,
            "usageRights": ["youtube", "commercial"],
            "exclusivity": false,
            "territory": "worldwide",
            "durationMonths": null
        });
        let llm = ScriptedLlm::new(vec![Ok(reply.to_string())]);

        let (status, response) =
            call_at(fast_state(llm), "/api/negotiate/final-terms", transcript_body(json!({})))
                .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["conversationId"], json!("conv-42"));
        assert_eq!(response["terms"]["usageRights"], json!(["youtube", "commercial"]));
        assert_eq!(response["contract"]["price"], json!(127.5));
        assert_eq!(response["contract"]["usageRights"], json!(["YOUTUBE", "COMMERCIAL"]));
        assert_eq!(response["toolCalls"][0]["tool"], json!("generate_contract"));
        assert_eq!(response["toolCalls"][1]["tool"], json!("validate_price"));
        assert!(response.get("priceFloorViolation").is_none());
    }

    #[tokio::test]
    async fn final_terms_below_the_floor_are_flagged() {
        let reply = r#"{"price": 30, "usageRights": ["YOUTUBE"]}"#;
        let llm = ScriptedLlm::new(vec![Ok(reply.to_string())]);

        let (status, response) =
            call_at(fast_state(llm), "/api/negotiate/final-terms", transcript_body(json!({})))
                .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["priceFloorViolation"], json!(true));
        assert_eq!(response["contract"]["price"], json!(30.0));
        assert_eq!(response["toolCalls"][1]["result"]["valid"], json!(false));
    }

    #[tokio::test]
    async fn unreadable_final_terms_draft_nothing() {
        let llm = ScriptedLlm::new(vec![Ok("The buyer agreed, congratulations!".to_string())]);

        let (status, response) =
            call_at(fast_state(llm), "/api/negotiate/final-terms", transcript_body(json!({})))
                .await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.get("terms").is_none());
        assert!(response.get("contract").is_none());
        assert_eq!(response["toolCalls"], json!([]));
    }

    #[tokio::test]
    async fn final_terms_require_a_transcript_and_a_fast_client() {
        let llm = ScriptedLlm::new(Vec::new());
        let (status, response) = call_at(
            fast_state(llm),
            "/api/negotiate/final-terms",
            transcript_body(json!({ "history": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response["error"],
            json!("Missing required fields: conversationId, history, baseTerms")
        );

        let state = AppState::new(AppConfig::default(), Backends::default());
        let (status, response) =
            call_at(state, "/api/negotiate/final-terms", transcript_body(json!({}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response["details"], json!("fast_llm is not configured"));
    }
}
