use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters for the click pipeline.
///
/// Flush outcomes end up here as well as in the log, so lost batches are
/// visible without grepping.
#[derive(Debug, Default)]
pub struct PipelineStats {
    events_accepted: AtomicU64,
    flushes: AtomicU64,
    events_flushed: AtomicU64,
    rows_upserted: AtomicU64,
    failed_flushes: AtomicU64,
    events_lost: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    pub events_accepted: u64,
    pub flushes: u64,
    pub events_flushed: u64,
    pub rows_upserted: u64,
    pub failed_flushes: u64,
    pub events_lost: u64,
}

impl PipelineStats {
    pub fn record_accepted(&self) {
        self.events_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, events: usize, rows: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.events_flushed.fetch_add(events as u64, Ordering::Relaxed);
        self.rows_upserted.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn record_failed_flush(&self, events: usize) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.events_lost.fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            events_flushed: self.events_flushed.load(Ordering::Relaxed),
            rows_upserted: self.rows_upserted.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            events_lost: self.events_lost.load(Ordering::Relaxed),
        }
    }
}
