//! HTTP ingress.
//!
//! | Route | Result |
//! |-------|--------|
//! | `POST /transfers` | `202 Accepted` once the prepare is on the backbone |
//! | `GET /health` | `{"status":"OK"}` |
//!
//! Failures carry an FSPIOP error body:
//! `{"errorInformation":{"errorCode":"3201","errorDescription":"..."}}`.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared_types::{Headers, TransferPrepareRequest};
use std::sync::Arc;
use tracing::{debug, warn};
use transfer_prepare::{PrepareError, TransferPrepareApi};

/// FSPIOP error codes used by the ingress.
pub mod error_codes {
    /// Internal server error
    pub const INTERNAL_SERVER_ERROR: &str = "2001";
    /// Downstream messaging unavailable
    pub const SERVICE_UNAVAILABLE: &str = "2003";
    /// Generic validation error
    pub const VALIDATION_ERROR: &str = "3100";
    /// Body is not valid JSON for a prepare
    pub const MALFORMED_SYNTAX: &str = "3101";
    /// Destination FSP could not be resolved
    pub const DESTINATION_FSP_ERROR: &str = "3201";
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    api: Arc<dyn TransferPrepareApi>,
}

/// Build the ingress router.
pub fn router(api: Arc<dyn TransferPrepareApi>) -> Router {
    Router::new()
        .route("/transfers", post(handle_prepare))
        .route("/health", get(health_check))
        .with_state(AppState { api })
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

async fn handle_prepare(
    State(state): State<AppState>,
    header_map: HeaderMap,
    body: String,
) -> Response {
    let request: TransferPrepareRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected malformed prepare body");
            return error_body(
                StatusCode::BAD_REQUEST,
                error_codes::MALFORMED_SYNTAX,
                format!("Malformed syntax: {e}"),
            );
        }
    };

    let headers = to_headers(&header_map);
    match state.api.prepare(&headers, &request).await {
        Ok(_) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            warn!(transfer_id = %request.transfer_id, error = %e, kind = e.kind(), "Prepare rejected");
            let (status, code) = classify(&e);
            error_body(status, code, e.to_string())
        }
    }
}

/// Status and FSPIOP error code for a prepare failure.
pub fn classify(error: &PrepareError) -> (StatusCode, &'static str) {
    match error {
        PrepareError::Resolution(e) if e.is_not_found() => {
            (StatusCode::NOT_FOUND, error_codes::DESTINATION_FSP_ERROR)
        }
        PrepareError::Resolution(_) => (StatusCode::BAD_GATEWAY, error_codes::DESTINATION_FSP_ERROR),
        PrepareError::Build(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
        PrepareError::Publish(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
        ),
        PrepareError::Configuration(_) | PrepareError::DeadlineExceeded { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_SERVER_ERROR,
        ),
    }
}

fn error_body(status: StatusCode, code: &str, description: String) -> Response {
    (
        status,
        Json(json!({
            "errorInformation": {
                "errorCode": code,
                "errorDescription": description
            }
        })),
    )
        .into_response()
}

/// Header names arrive lowercased. Non UTF-8 values are dropped; repeated
/// headers are joined with `", "` in arrival order.
fn to_headers(header_map: &HeaderMap) -> Headers {
    header_map
        .keys()
        .filter_map(|name| {
            let values: Vec<&str> = header_map
                .get_all(name)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect();
            (!values.is_empty()).then(|| (name.as_str().to_string(), values.join(", ")))
        })
        .collect()
}
