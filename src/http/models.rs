use crate::pipeline::PipelineStatsSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query string for GET /counter/{banner_id}
#[derive(Debug, Default, Deserialize)]
pub struct CounterParams {
    /// Number of clicks to record; defaults to one.
    pub count: Option<i64>,
}

/// Request body for POST /stats/{banner_id}
#[derive(Debug, Deserialize)]
pub struct StatsRequest {
    pub ts_from: DateTime<Utc>,
    pub ts_to: DateTime<Utc>,
}

/// One per-minute bucket
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatEntry {
    pub timestamp: DateTime<Utc>,
    pub count: i64,
}

/// Response body for POST /stats/{banner_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: Vec<StatEntry>,
}

/// Response body for GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub queued_events: usize,
    pub pipeline: PipelineStatsSnapshot,
}
