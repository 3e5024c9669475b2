use axum::{extract::rejection::JsonRejection, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use soundchain_core::domain::license::{
    license_status, renewal_quote, validate_renewal_months, LicenseRecord, LicenseStatusReport,
    RenewalQuote,
};
use soundchain_core::errors::{ApplicationError, DomainError};
use tracing::info;

use crate::error::{api_error, ApiError};

const STATUS_ROUTE: &str = "/api/licenses/status";
const RENEWAL_ROUTE: &str = "/api/licenses/renewal-quote";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatusRequest {
    pub license: LicenseRecord,
    /// Evaluation instant; the server clock when omitted.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalQuoteRequest {
    pub license: Option<LicenseRecord>,
    pub duration_months: Option<u32>,
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

/// Stateless: license data is supplied by the caller on every request.
pub fn router() -> Router {
    Router::new().route(STATUS_ROUTE, post(status)).route(RENEWAL_ROUTE, post(renewal))
}

fn invalid_body(route: &'static str, rejection: JsonRejection) -> ApiError {
    api_error(
        route,
        ApplicationError::Validation(format!("Invalid request body: {}", rejection.body_text())),
    )
}

pub async fn status(
    payload: Result<Json<LicenseStatusRequest>, JsonRejection>,
) -> Result<Json<LicenseStatusReport>, ApiError> {
    let Json(request) = payload.map_err(|rejection| invalid_body(STATUS_ROUTE, rejection))?;
    let now = request.now.unwrap_or_else(Utc::now);

    Ok(Json(license_status(&request.license, now)))
}

pub async fn renewal(
    payload: Result<Json<RenewalQuoteRequest>, JsonRejection>,
) -> Result<Json<RenewalQuote>, ApiError> {
    let Json(request) = payload.map_err(|rejection| invalid_body(RENEWAL_ROUTE, rejection))?;
    let (Some(license), Some(months)) = (request.license, request.duration_months) else {
        return Err(api_error(
            RENEWAL_ROUTE,
            ApplicationError::Validation(
                "Missing required fields: license, durationMonths".to_string(),
            ),
        ));
    };
    let now = request.now.unwrap_or_else(Utc::now);

    let quote = validate_renewal_months(months)
        .and_then(|months| renewal_quote(&license, months, now))
        .map_err(|err| {
            let failure = match err {
                DomainError::NotRenewable(reason) => {
                    ApplicationError::Validation(format!("Cannot renew: {reason}"))
                }
                other => ApplicationError::Domain(other),
            };
            api_error(RENEWAL_ROUTE, failure)
        })?;

    info!(
        event_name = "license.renewal_quoted",
        license_id = %quote.license_id,
        duration_months = quote.duration_months,
        "renewal quoted"
    );
    Ok(Json(quote))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Json,
    };
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{renewal, router, status, RenewalQuoteRequest};

    fn renewal_request(body: Value) -> RenewalQuoteRequest {
        serde_json::from_value(body).expect("request should deserialize")
    }

    #[tokio::test]
    async fn status_flags_licenses_close_to_expiry() {
        let request = serde_json::from_value(json!({
            "license": {
                "id": "lic-1",
                "price": 100.0,
                "status": "ACTIVE",
                "expiresAt": "2025-02-01T00:00:00Z"
            },
            "now": "2025-01-20T00:00:00Z"
        }))
        .expect("request should deserialize");

        let Json(report) = status(Ok(Json(request))).await.expect("status");

        assert_eq!(report.days_remaining, Some(12));
        assert!(report.expiring_soon);
        assert!(report.can_renew);
        assert!(report.can_use);
    }

    #[tokio::test]
    async fn renewal_extends_from_current_expiry_at_a_discount() {
        let request = renewal_request(json!({
            "license": {
                "id": "lic-2",
                "price": 200.0,
                "status": "ACTIVE",
                "expiresAt": "2025-03-01T00:00:00Z"
            },
            "durationMonths": 12,
            "now": "2025-01-20T00:00:00Z"
        }));

        let Json(quote) = renewal(Ok(Json(request))).await.expect("quote");

        assert_eq!(quote.license_id, "lic-2");
        assert_eq!(
            Some(quote.new_expires_at),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single()
        );
        assert_eq!(quote.renewal_price, Decimal::new(160, 0));
    }

    #[tokio::test]
    async fn renewal_rejects_out_of_range_duration() {
        let request = renewal_request(json!({
            "license": { "id": "lic-3", "price": 10.0 },
            "durationMonths": 121
        }));

        let (status, Json(body)) =
            renewal(Ok(Json(request))).await.expect_err("duration is invalid");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("between 1 and 120 months"));
    }

    #[tokio::test]
    async fn revoked_license_cannot_be_renewed() {
        let request = renewal_request(json!({
            "license": { "id": "lic-4", "price": 10.0, "status": "REVOKED" },
            "durationMonths": 6
        }));

        let (status, Json(body)) =
            renewal(Ok(Json(request))).await.expect_err("revoked");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.starts_with("Cannot renew: "));
    }

    #[tokio::test]
    async fn renewal_route_requires_license_and_duration() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/licenses/renewal-quote")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "durationMonths": 3 }).to_string()))
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        let payload: Value = serde_json::from_slice(&bytes).expect("body should be json");
        assert_eq!(payload["error"], json!("Missing required fields: license, durationMonths"));
    }
}
