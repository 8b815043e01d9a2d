use crate::http::models::HealthResponse;
use crate::ClickEngine;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

/// Handler for GET /health
pub async fn health_handler(State(engine): State<Arc<ClickEngine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "clickstat",
        queued_events: engine.queued_events(),
        pipeline: engine.pipeline_stats(),
    })
}
