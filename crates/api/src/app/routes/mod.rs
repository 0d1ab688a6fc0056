use axum::{
    routing::{get, patch, post},
    Router,
};

pub mod reconciliation;
pub mod staff;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/create-staff", post(staff::create_staff))
        .route("/staff/:user_id/status", patch(staff::update_status))
        .route("/reconciliation", get(reconciliation::pending))
        .route("/reconciliation/run", post(reconciliation::run))
}
