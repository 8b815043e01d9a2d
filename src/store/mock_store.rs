//! Mock store implementation for testing.
//!
//! Keeps rows in memory with the same additive merge semantics as the SQL
//! backends, records every successful upsert, and can be configured to fail or
//! stall so that flush error handling can be exercised without a database.

use super::{BucketCount, BucketDelta, ClickStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One committed call to [`ClickStore::upsert_counts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFlush {
    pub bucket: DateTime<Utc>,
    pub deltas: Vec<BucketDelta>,
}

impl RecordedFlush {
    /// Sum of all amounts in this flush.
    pub fn total(&self) -> i64 {
        self.deltas.iter().map(|d| d.amount).sum()
    }
}

#[derive(Debug)]
pub struct MockStore {
    rows: Mutex<BTreeMap<(i64, i64), i64>>,
    flushes: Mutex<Vec<RecordedFlush>>,
    fail_upsert: AtomicBool,
    upsert_delay: Mutex<Option<Duration>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            flushes: Mutex::new(Vec::new()),
            fail_upsert: AtomicBool::new(false),
            upsert_delay: Mutex::new(None),
        }
    }

    /// Configure whether upserts should fail.
    pub fn set_fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    /// Make every upsert sleep before applying, to simulate a slow store.
    pub fn set_upsert_delay(&self, delay: Option<Duration>) {
        *self.upsert_delay.lock().unwrap() = delay;
    }

    pub fn recorded_flushes(&self) -> Vec<RecordedFlush> {
        self.flushes.lock().unwrap().clone()
    }

    /// Stored count for one (banner, bucket) row, if any.
    pub fn count_for(&self, banner_id: i64, bucket: DateTime<Utc>) -> Option<i64> {
        self.rows
            .lock()
            .unwrap()
            .get(&(banner_id, bucket.timestamp()))
            .copied()
    }

    /// Poll until at least `n` flushes are recorded or `timeout` elapses.
    pub async fn wait_for_flushes(&self, n: usize, timeout: Duration) -> Vec<RecordedFlush> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let flushes = self.recorded_flushes();
            if flushes.len() >= n || tokio::time::Instant::now() >= deadline {
                return flushes;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClickStore for MockStore {
    async fn run_migrations(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_counts(&self, bucket: DateTime<Utc>, deltas: &[BucketDelta]) -> Result<()> {
        let delay = *self.upsert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_upsert.load(Ordering::SeqCst) {
            anyhow::bail!("Mock upsert failure");
        }

        let mut rows = self.rows.lock().unwrap();
        for delta in deltas {
            let count = rows.entry((delta.banner_id, bucket.timestamp())).or_insert(0);
            *count = count.saturating_add(delta.amount);
        }
        self.flushes.lock().unwrap().push(RecordedFlush {
            bucket,
            deltas: deltas.to_vec(),
        });
        Ok(())
    }

    async fn select_range(
        &self,
        banner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BucketCount>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .range((banner_id, i64::MIN)..=(banner_id, i64::MAX))
            .filter(|((_, bucket), _)| {
                let ts = DateTime::from_timestamp(*bucket, 0).unwrap_or_default();
                ts >= from && ts <= to
            })
            .map(|((_, bucket), count)| BucketCount {
                bucket: *bucket,
                count: *count,
            })
            .collect())
    }
}
