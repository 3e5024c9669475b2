use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::bootstrap::AppState;

const BACKEND_SERVICES: [&str; 3] = ["fast_llm", "agent_memory", "fallback_llm"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub backends: BTreeMap<&'static str, &'static str>,
    pub checked_at: String,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Always healthy; the body tells which collaborators have credentials.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let configured = state.config.configured_backends();
    let backends = BACKEND_SERVICES
        .into_iter()
        .map(|service| {
            let status =
                if configured.contains(&service) { "configured" } else { "not configured" };
            (service, status)
        })
        .collect();

    Json(HealthResponse { status: "healthy", backends, checked_at: Utc::now().to_rfc3339() })
}
