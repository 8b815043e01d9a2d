use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt::Debug;

/// A persisted per-minute aggregate for one banner.
///
/// `bucket` is the minute-aligned Unix timestamp in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BucketCount {
    pub bucket: i64,
    pub count: i64,
}

impl BucketCount {
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.bucket, 0).unwrap_or_default()
    }
}

/// Amount to add to one banner's row in a given bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketDelta {
    pub banner_id: i64,
    pub amount: i64,
}

/// Async interface for click storage.
///
/// Implementations must apply `upsert_counts` as a single transaction and
/// merge into existing rows additively.
#[async_trait]
pub trait ClickStore: Debug + Send + Sync {
    /// Close the pool. Idempotent.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Apply any pending schema migrations. Should be idempotent.
    async fn run_migrations(&self) -> Result<()>;

    /// Add every delta into the row keyed by (banner_id, `bucket`), creating
    /// rows that do not exist yet. All-or-nothing.
    async fn upsert_counts(&self, bucket: DateTime<Utc>, deltas: &[BucketDelta]) -> Result<()>;

    /// Rows for `banner_id` with `from <= bucket <= to`, ascending by bucket.
    async fn select_range(
        &self,
        banner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BucketCount>>;
}
