use crate::http::error::ApiError;
use crate::http::models::CounterParams;
use crate::pipeline::CounterId;
use crate::ClickEngine;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use std::sync::Arc;

/// Handler for GET /counter/{banner_id}
///
/// Returns as soon as the click is queued. A full queue makes this wait.
#[tracing::instrument(
    name = "handler_counter",
    skip(engine, params),
    fields(clickstat.count = tracing::field::Empty)
)]
pub async fn counter_handler(
    State(engine): State<Arc<ClickEngine>>,
    Path(banner_id): Path<String>,
    Query(params): Query<CounterParams>,
) -> Result<StatusCode, ApiError> {
    let counter_id: CounterId = banner_id.parse()?;
    let count = params.count.unwrap_or(1);
    tracing::Span::current().record("clickstat.count", count);

    engine.submit(counter_id, count).await?;

    Ok(StatusCode::OK)
}
