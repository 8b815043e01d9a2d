use crate::engine::StatsQuery;
use crate::http::error::ApiError;
use crate::http::models::{StatEntry, StatsRequest, StatsResponse};
use crate::pipeline::CounterId;
use crate::ClickEngine;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

/// Handler for POST /stats/{banner_id}
#[tracing::instrument(
    name = "handler_stats",
    skip(engine, request),
    fields(clickstat.row_count = tracing::field::Empty)
)]
pub async fn stats_handler(
    State(engine): State<Arc<ClickEngine>>,
    Path(banner_id): Path<String>,
    request: Result<Json<StatsRequest>, JsonRejection>,
) -> Result<Json<StatsResponse>, ApiError> {
    let counter_id: CounterId = banner_id.parse()?;
    let Json(request) = request.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let query = StatsQuery::new(counter_id, request.ts_from, request.ts_to)?;
    let rows = engine.get_stats(query).await?;

    tracing::Span::current().record("clickstat.row_count", rows.len());

    let stats = rows
        .into_iter()
        .map(|row| StatEntry {
            timestamp: row.timestamp(),
            count: row.count,
        })
        .collect();

    Ok(Json(StatsResponse { stats }))
}
