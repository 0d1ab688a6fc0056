use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use staffgate_core::DomainError;
use staffgate_infra::StaffError;

/// `{success: false, message}` with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::MissingFields(missing) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": DomainError::MissingFields(Vec::new()).to_string(),
                "missing": missing,
            })),
        )
            .into_response(),
        other => json_error(StatusCode::BAD_REQUEST, other.to_string()),
    }
}

/// Malformed JSON, wrong field types and unknown fields all answer 400.
pub fn rejection_to_response(rejection: JsonRejection) -> Response {
    warn!(error = %rejection.body_text(), "rejected request body");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "message": "Invalid request body",
            "error": rejection.body_text(),
        })),
    )
        .into_response()
}

/// Backend failure of a staff operation: 500 with the failing stage and how
/// much of the operation was left behind.
pub fn staff_error_to_response(err: StaffError, message: &str) -> Response {
    error!(
        stage = %err.stage(),
        partial = err.is_partial(),
        compensated = err.compensated(),
        error = %err.backend_error(),
        "{message}"
    );

    let mut body = json!({
        "success": false,
        "message": message,
        "error": err.backend_error().to_string(),
        "stage": err.stage().as_str(),
        "partial": err.is_partial(),
        "compensated": err.compensated(),
    });
    if let Some(repair_id) = err.repair_id() {
        body["repairId"] = json!(repair_id.to_string());
    }

    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Backends were never initialised.
pub fn unavailable(reason: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "success": false,
            "message": "Backend services are unavailable",
            "error": reason,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_answer_bad_request() {
        let res = domain_error_to_response(DomainError::MissingFields(vec!["email"]));
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unavailable_is_503() {
        assert_eq!(unavailable("db down").status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
