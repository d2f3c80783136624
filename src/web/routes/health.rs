use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

use crate::services::ArbitrationEngine;

pub async fn health_handler(State(engine): State<ArbitrationEngine>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1").execute(engine.pool()).await {
        Ok(_) => "ok",
        Err(e) => {
            warn!("health check database query failed: {}", e);
            "unavailable"
        }
    };
    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "status": if status.is_success() { "ok" } else { "degraded" },
            "database": database,
            "build": env!("HACKMATE_BUILD_ID"),
        })),
    )
}
