//! Click ingestion pipeline: bounded queue, aggregation worker and flush.
//!
//! Producers submit [`IncrementEvent`]s through a [`ClickSender`]. A single
//! [`AggregationWorker`] drains the queue into a double-buffered [`Batch`] and
//! hands full or timed-out batches to the [`FlushExecutor`], which upserts
//! per-minute counts into the store.

mod batch;
mod error;
mod flush;
mod stats;
mod worker;

pub use batch::Batch;
pub use error::{FlushError, SubmitError};
pub use flush::{truncate_to_minute, FlushExecutor, FlushReport};
pub use stats::{PipelineStats, PipelineStatsSnapshot};
pub use worker::{AggregationWorker, WorkerConfig};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default capacity of the click queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Identifier of a counted banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CounterId(pub i64);

impl FromStr for CounterId {
    type Err = SubmitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(CounterId)
            .map_err(|_| SubmitError::InvalidCounterId(s.to_owned()))
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single increment of one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementEvent {
    pub counter_id: CounterId,
    pub amount: i64,
}

/// Largest increment a single event may carry.
pub const MAX_INCREMENT: i64 = i32::MAX as i64;

impl IncrementEvent {
    /// Counts only ever grow, so `amount` must be in `1..=MAX_INCREMENT`.
    pub fn new(counter_id: CounterId, amount: i64) -> Result<Self, SubmitError> {
        if !(1..=MAX_INCREMENT).contains(&amount) {
            return Err(SubmitError::InvalidAmount(amount));
        }
        Ok(Self { counter_id, amount })
    }
}

/// Consumer half of the click queue.
pub type ClickReceiver = mpsc::Receiver<IncrementEvent>;

/// Producer half of the click queue. Cheap to clone; one per request.
#[derive(Debug, Clone)]
pub struct ClickSender {
    inner: mpsc::Sender<IncrementEvent>,
    stats: Arc<PipelineStats>,
}

/// Create a bounded FIFO queue of increment events.
pub fn event_queue(capacity: usize, stats: Arc<PipelineStats>) -> (ClickSender, ClickReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (ClickSender { inner: tx, stats }, rx)
}

impl ClickSender {
    /// Enqueue an event, waiting for room when the queue is full.
    ///
    /// There is no timeout: a saturated queue stalls the caller instead of
    /// dropping the click.
    pub async fn submit(&self, event: IncrementEvent) -> Result<(), SubmitError> {
        self.inner
            .send(event)
            .await
            .map_err(|_| SubmitError::QueueClosed)?;
        self.stats.record_accepted();
        Ok(())
    }

    /// Number of events currently buffered in the queue.
    pub fn len(&self) -> usize {
        self.inner.max_capacity() - self.inner.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event(id: i64) -> IncrementEvent {
        IncrementEvent::new(CounterId(id), 1).unwrap()
    }

    #[test]
    fn counter_id_parses_integers_only() {
        assert_eq!("42".parse::<CounterId>().unwrap(), CounterId(42));
        assert_eq!(" 7 ".parse::<CounterId>().unwrap(), CounterId(7));
        assert!(matches!(
            "abc".parse::<CounterId>(),
            Err(SubmitError::InvalidCounterId(_))
        ));
        assert!("12abc".parse::<CounterId>().is_err());
        assert!("".parse::<CounterId>().is_err());
    }

    #[test]
    fn increment_rejects_non_positive_amounts() {
        assert!(IncrementEvent::new(CounterId(1), 0).is_err());
        assert!(IncrementEvent::new(CounterId(1), -3).is_err());
        assert_eq!(IncrementEvent::new(CounterId(1), 5).unwrap().amount, 5);
    }

    #[test]
    fn increment_rejects_amounts_above_cap() {
        assert!(IncrementEvent::new(CounterId(1), MAX_INCREMENT).is_ok());
        assert!(matches!(
            IncrementEvent::new(CounterId(1), MAX_INCREMENT + 1),
            Err(SubmitError::InvalidAmount(_))
        ));
        assert!(IncrementEvent::new(CounterId(1), i64::MAX).is_err());
    }

    #[tokio::test]
    async fn submit_blocks_when_queue_is_full() {
        let (tx, mut rx) = event_queue(2, Arc::new(PipelineStats::default()));

        tx.submit(event(1)).await.unwrap();
        tx.submit(event(2)).await.unwrap();
        assert_eq!(tx.len(), 2);

        let blocked = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.submit(event(3)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished(), "third submit should wait for room");

        assert_eq!(rx.recv().await, Some(event(1)));
        tokio::time::timeout(Duration::from_secs(5), blocked)
            .await
            .expect("submit should complete once room is made")
            .unwrap()
            .unwrap();

        assert_eq!(rx.recv().await, Some(event(2)));
        assert_eq!(rx.recv().await, Some(event(3)));
    }

    #[tokio::test]
    async fn submit_fails_after_queue_close() {
        let (tx, mut rx) = event_queue(4, Arc::new(PipelineStats::default()));
        rx.close();

        assert!(matches!(
            tx.submit(event(1)).await,
            Err(SubmitError::QueueClosed)
        ));
        assert!(tx.is_closed());
    }
}
