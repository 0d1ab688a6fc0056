use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app::errors;
use crate::app::services::AppServices;

/// Repair markers awaiting the sweep.
pub async fn pending(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let provisioner = match services.provisioner() {
        Ok(p) => p,
        Err(res) => return res,
    };
    match provisioner.repairs().pending().await {
        Ok(pending) => Json(json!({ "success": true, "pending": pending })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "message": "Failed to read repair log",
                "error": e.to_string(),
            })),
        )
            .into_response(),
    }
}

/// Run one reconciliation sweep now.
pub async fn run(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let provisioner = match services.provisioner() {
        Ok(p) => p,
        Err(res) => return res,
    };
    match provisioner.reconcile().await {
        Ok(report) => Json(json!({
            "success": true,
            "repaired": report.repaired,
            "remaining": report.remaining,
        }))
        .into_response(),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Reconciliation sweep failed: {e}"),
        ),
    }
}
