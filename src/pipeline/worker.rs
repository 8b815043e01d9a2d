use crate::pipeline::flush::DEFAULT_FLUSH_TIMEOUT;
use crate::pipeline::{Batch, ClickReceiver, FlushExecutor, IncrementEvent, PipelineStats};
use crate::store::ClickStore;
use chrono::Utc;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Tuning for the aggregation worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Flush as soon as the batch holds this many events.
    pub batch_size: usize,
    /// Flush whatever is buffered at this period.
    pub flush_interval: Duration,
    /// Abandon a flush that has not committed within this time.
    pub flush_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(1),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FlushTrigger {
    Threshold,
    Timer,
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlushTrigger::Threshold => "threshold",
            FlushTrigger::Timer => "timer",
            FlushTrigger::Shutdown => "shutdown",
        })
    }
}

/// Single consumer of the click queue.
///
/// Accumulates events into a [`Batch`] and flushes it when it reaches
/// `batch_size` or when the timer fires, whichever comes first. The flush runs
/// on the worker task itself, so a slow store throttles draining and the queue
/// fills up and pushes back on producers.
pub struct AggregationWorker {
    receiver: ClickReceiver,
    batch: Mutex<Batch>,
    executor: FlushExecutor,
    stats: Arc<PipelineStats>,
    config: WorkerConfig,
    shutdown_token: CancellationToken,
}

impl AggregationWorker {
    pub fn new(
        receiver: ClickReceiver,
        store: Arc<dyn ClickStore>,
        stats: Arc<PipelineStats>,
        config: WorkerConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            batch: Mutex::new(Batch::with_capacity(config.batch_size)),
            executor: FlushExecutor::new(store, config.flush_timeout),
            stats,
            config,
            shutdown_token,
        }
    }

    /// Run until shutdown is requested or every sender is dropped, then drain
    /// the queue and perform a final flush.
    pub async fn run(mut self) {
        let mut flush_interval = interval(self.config.flush_interval);
        flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; consume that tick.
        flush_interval.tick().await;

        loop {
            tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(e) => self.on_event(e).await,
                    None => {
                        info!("Click queue closed by producers, flushing remaining events");
                        self.flush(FlushTrigger::Shutdown).await;
                        break;
                    }
                },
                _ = flush_interval.tick() => self.flush(FlushTrigger::Timer).await,
                _ = self.shutdown_token.cancelled() => {
                    self.on_shutdown().await;
                    break;
                }
            }
        }

        info!("Aggregation worker stopped");
    }

    async fn on_event(&self, event: IncrementEvent) {
        let len = self.batch().push(event);
        if len >= self.config.batch_size {
            self.flush(FlushTrigger::Threshold).await;
        }
    }

    async fn on_shutdown(&mut self) {
        info!("Aggregation worker received shutdown signal, draining queue");
        // Refuse new submissions; events already queued are still delivered.
        self.receiver.close();

        let mut drained = 0usize;
        while let Some(event) = self.receiver.recv().await {
            drained += 1;
            self.on_event(event).await;
        }
        debug!(drained, "Click queue drained");

        self.flush(FlushTrigger::Shutdown).await;
    }

    fn batch(&self) -> MutexGuard<'_, Batch> {
        self.batch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn flush(&self, trigger: FlushTrigger) {
        let taken = self.batch().take();
        let Some(events) = taken else {
            return;
        };

        match self.executor.flush(&events, Utc::now()).await {
            Ok(report) => {
                self.stats.record_flush(report.events, report.rows);
                debug!(
                    trigger = %trigger,
                    bucket = %report.bucket,
                    events = report.events,
                    rows = report.rows,
                    "Flushed click batch"
                );
            }
            Err(e) => {
                self.stats.record_failed_flush(events.len());
                error!(
                    trigger = %trigger,
                    events = events.len(),
                    error = %e,
                    "Failed to flush click batch, counts dropped"
                );
            }
        }

        self.batch().recycle(events);
    }
}
