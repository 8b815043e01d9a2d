use crate::pipeline::{FlushError, IncrementEvent};
use crate::store::{BucketDelta, ClickStore};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound on one flush transaction.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// Outcome of a committed flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub bucket: DateTime<Utc>,
    pub events: usize,
    pub rows: usize,
}

/// Persists captured batches into the store.
///
/// Every event in one flush lands in the bucket of the flush instant, not of
/// its own arrival.
#[derive(Debug, Clone)]
pub struct FlushExecutor {
    store: Arc<dyn ClickStore>,
    timeout: Duration,
}

impl FlushExecutor {
    pub fn new(store: Arc<dyn ClickStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Upsert `events` into the minute bucket containing `now`.
    ///
    /// The store sees one delta per distinct counter, applied in a single
    /// transaction. On error or timeout nothing is committed and the events
    /// are not retried.
    pub async fn flush(
        &self,
        events: &[IncrementEvent],
        now: DateTime<Utc>,
    ) -> Result<FlushReport, FlushError> {
        let bucket = truncate_to_minute(now);
        let deltas = aggregate(events);

        match tokio::time::timeout(self.timeout, self.store.upsert_counts(bucket, &deltas)).await {
            Ok(Ok(())) => Ok(FlushReport {
                bucket,
                events: events.len(),
                rows: deltas.len(),
            }),
            Ok(Err(e)) => Err(FlushError::Storage(e)),
            Err(_) => Err(FlushError::Timeout(self.timeout)),
        }
    }
}

/// Sum amounts per counter, ordered by counter id.
///
/// A counter whose sum would overflow `i64` gets an additional delta instead;
/// the store applies both in the same transaction.
fn aggregate(events: &[IncrementEvent]) -> Vec<BucketDelta> {
    let mut sums: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for event in events {
        let parts = sums.entry(event.counter_id.0).or_default();
        match parts.last().and_then(|sum| sum.checked_add(event.amount)) {
            Some(total) => {
                parts.pop();
                parts.push(total);
            }
            None => parts.push(event.amount),
        }
    }
    sums.into_iter()
        .flat_map(|(banner_id, parts)| {
            parts
                .into_iter()
                .map(move |amount| BucketDelta { banner_id, amount })
        })
        .collect()
}
