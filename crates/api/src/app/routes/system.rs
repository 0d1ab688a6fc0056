use axum::Json;
use serde_json::{json, Value};

/// Liveness probe. Answers even when backends failed to initialise.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "Server is running" }))
}
