use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use staffgate_core::{NewStaff, StaffId};
use staffgate_infra::document_store::StoreError;
use staffgate_infra::{Stage, StaffError};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn create_staff(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateStaffRequest>, JsonRejection>,
) -> Response {
    let provisioner = match services.provisioner() {
        Ok(p) => p,
        Err(res) => return res,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };
    let staff = match NewStaff::validate(body.into()) {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match provisioner.create_staff(staff).await {
        Ok(uid) => {
            info!(staff_id = %uid, "staff member created");
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Staff member created successfully",
                    "uid": uid,
                })),
            )
                .into_response()
        }
        Err(e) => errors::staff_error_to_response(e, "Failed to create staff member"),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
    body: Result<Json<dto::UpdateStatusRequest>, JsonRejection>,
) -> Response {
    let provisioner = match services.provisioner() {
        Ok(p) => p,
        Err(res) => return res,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };
    let Some(is_active) = body.is_active else {
        return errors::json_error(StatusCode::BAD_REQUEST, "isActive status is required");
    };
    // No record can exist under an id the provider would never issue.
    let id: StaffId = match user_id.parse() {
        Ok(id) => id,
        Err(_) => {
            let err = StaffError::Aborted {
                stage: Stage::LoadRecord,
                source: StoreError::NotFound(format!("No staff record for id {user_id}")).into(),
            };
            return errors::staff_error_to_response(err, "Failed to update staff status");
        }
    };

    match provisioner.set_active(&id, is_active).await {
        Ok(change) => {
            let verb = if change.is_active { "activated" } else { "deactivated" };
            info!(staff_id = %change.staff_id, is_active = change.is_active, "staff status updated");
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": format!("Staff member {verb} successfully"),
                })),
            )
                .into_response()
        }
        Err(e) => errors::staff_error_to_response(e, "Failed to update staff status"),
    }
}
