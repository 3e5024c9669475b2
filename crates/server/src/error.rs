use axum::{http::StatusCode, Json};
use serde::Serialize;
use soundchain_core::errors::{ApplicationError, InterfaceError};
use tracing::{error, warn};
use uuid::Uuid;

pub type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub correlation_id: String,
}

pub fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Maps an application failure onto the HTTP boundary. Bad requests echo the
/// validation message; everything else gets the user-safe message plus details.
pub fn api_error(route: &'static str, failure: ApplicationError) -> ApiError {
    let interface = failure.into_interface(correlation_id());
    let (status, body) = match &interface {
        InterfaceError::BadRequest { message, correlation_id } => {
            warn!(
                event_name = "http.request_rejected",
                correlation_id = %correlation_id,
                route,
                reason = %message,
                "request rejected"
            );
            (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: message.clone(),
                    details: None,
                    correlation_id: correlation_id.clone(),
                },
            )
        }
        InterfaceError::ServiceUnavailable { message, correlation_id }
        | InterfaceError::Internal { message, correlation_id } => {
            error!(
                event_name = "http.request_failed",
                correlation_id = %correlation_id,
                route,
                error = %message,
                "request failed"
            );
            let status = if matches!(interface, InterfaceError::ServiceUnavailable { .. }) {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                ErrorBody {
                    error: interface.user_message().to_string(),
                    details: Some(message.clone()),
                    correlation_id: correlation_id.clone(),
                },
            )
        }
    };
    (status, Json(body))
}
