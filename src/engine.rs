use crate::config::AppConfig;
use crate::pipeline::{
    event_queue, AggregationWorker, ClickSender, CounterId, IncrementEvent, PipelineStats,
    PipelineStatsSnapshot, SubmitError, WorkerConfig, DEFAULT_QUEUE_CAPACITY,
};
use crate::store::{BucketCount, ClickStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Rejected stats request; the caller's fault, not a storage failure.
#[derive(Debug, Error)]
pub enum QueryInputError {
    #[error("ts_from ({from}) must not be after ts_to ({to})")]
    InvertedRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// Request for per-minute counts of one banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsQuery {
    pub counter_id: CounterId,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl StatsQuery {
    pub fn new(
        counter_id: CounterId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Self, QueryInputError> {
        if from > to {
            return Err(QueryInputError::InvertedRange { from, to });
        }
        Ok(Self {
            counter_id,
            from,
            to,
        })
    }
}

/// Owns the click pipeline and the store it writes to.
///
/// Built once at startup and shared with the HTTP layer behind an `Arc`.
pub struct ClickEngine {
    store: Arc<dyn ClickStore>,
    sender: ClickSender,
    stats: Arc<PipelineStats>,
    shutdown_token: CancellationToken,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown_grace: Duration,
}

impl ClickEngine {
    pub fn builder() -> ClickEngineBuilder {
        ClickEngineBuilder::new()
    }

    /// Connect storage described by `config` and start the pipeline.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store = crate::store::connect(&config.storage).await?;

        Self::builder()
            .store(store)
            .queue_capacity(config.pipeline.queue_capacity)
            .worker_config(config.pipeline.worker_config())
            .shutdown_grace(config.pipeline.shutdown_grace())
            .build()
            .await
    }

    /// Record `amount` clicks for `counter_id`.
    ///
    /// Waits while the queue is full. Returns once the event is queued, before
    /// it is persisted; later flush failures are not reported here.
    pub async fn submit(&self, counter_id: CounterId, amount: i64) -> Result<(), SubmitError> {
        let event = IncrementEvent::new(counter_id, amount)?;
        self.sender.submit(event).await
    }

    /// Stored per-minute counts for the query, ascending by bucket.
    #[tracing::instrument(
        name = "get_stats",
        skip(self),
        fields(
            clickstat.banner_id = %query.counter_id,
            clickstat.rows = tracing::field::Empty,
        )
    )]
    pub async fn get_stats(&self, query: StatsQuery) -> Result<Vec<BucketCount>> {
        let rows = self
            .store
            .select_range(query.counter_id.0, query.from, query.to)
            .await?;
        tracing::Span::current().record("clickstat.rows", rows.len());
        Ok(rows)
    }

    pub fn pipeline_stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Events waiting in the queue.
    pub fn queued_events(&self) -> usize {
        self.sender.len()
    }

    pub fn store(&self) -> &Arc<dyn ClickStore> {
        &self.store
    }

    /// Stop ingestion, drain and flush the queue, then close the store.
    ///
    /// Waits at most the configured grace period for the final flush; a worker
    /// still running after that is aborted and its batch is lost.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_token.cancel();

        if let Some(mut handle) = self.worker_handle.lock().await.take() {
            match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
                Ok(Ok(())) => info!("Click pipeline drained"),
                Ok(Err(e)) => warn!("Aggregation worker ended abnormally: {}", e),
                Err(_) => {
                    warn!(
                        grace_ms = self.shutdown_grace.as_millis() as u64,
                        "Aggregation worker did not finish within grace period, aborting"
                    );
                    handle.abort();
                }
            }
        }

        self.store.close().await
    }
}

impl Drop for ClickEngine {
    fn drop(&mut self) {
        // Let the worker drain on its own if shutdown() was never called.
        self.shutdown_token.cancel();
    }
}

/// Builder for ClickEngine
pub struct ClickEngineBuilder {
    store: Option<Arc<dyn ClickStore>>,
    queue_capacity: usize,
    worker_config: WorkerConfig,
    shutdown_grace: Duration,
}

impl Default for ClickEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClickEngineBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_config: WorkerConfig::default(),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    /// Set the store. Required.
    pub fn store(mut self, store: Arc<dyn ClickStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bound on queued, not-yet-aggregated events. Minimum value is 1.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn worker_config(mut self, config: WorkerConfig) -> Self {
        self.worker_config = config;
        self
    }

    /// How long shutdown waits for the final flush. Defaults to 5 seconds.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub async fn build(self) -> Result<ClickEngine> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("ClickEngine requires a store"))?;

        let mut worker_config = self.worker_config;
        worker_config.batch_size = worker_config.batch_size.max(1);

        let stats = Arc::new(PipelineStats::default());
        let (sender, receiver) = event_queue(self.queue_capacity, stats.clone());
        let shutdown_token = CancellationToken::new();

        let worker = AggregationWorker::new(
            receiver,
            store.clone(),
            stats.clone(),
            worker_config,
            shutdown_token.clone(),
        );
        let worker_handle = tokio::spawn(worker.run());

        info!(
            queue_capacity = self.queue_capacity,
            batch_size = worker_config.batch_size,
            flush_interval_ms = worker_config.flush_interval.as_millis() as u64,
            "Click pipeline started"
        );

        Ok(ClickEngine {
            store,
            sender,
            stats,
            shutdown_token,
            worker_handle: Mutex::new(Some(worker_handle)),
            shutdown_grace: self.shutdown_grace,
        })
    }
}
