use crate::errors::ServiceError;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Readiness probe: verifies the database answers
pub async fn ready(State(state): State<AppState>) -> Result<Json<HealthResponse>, ServiceError> {
    crate::db::ping(&state.db)
        .await
        .map_err(|e| ServiceError::ServiceUnavailable(e.to_string()))?;
    Ok(Json(HealthResponse { status: "ready" }))
}

/// Health routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/ready", get(ready))
}
