//! Error types for the ingestion pipeline

use std::time::Duration;
use thiserror::Error;

/// Errors a caller can see when submitting clicks.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Counter identifier is not an integer
    #[error("invalid banner ID: {0:?}")]
    InvalidCounterId(String),

    /// Increment is not positive or exceeds `MAX_INCREMENT`
    #[error("invalid click count: {0} (must be between 1 and 2147483647)")]
    InvalidAmount(i64),

    /// The queue no longer accepts events (shutdown in progress)
    #[error("click queue is closed")]
    QueueClosed,
}

/// Errors raised while persisting a batch. These never leave the worker.
#[derive(Debug, Error)]
pub enum FlushError {
    /// Storage did not finish the transaction in time; it was abandoned
    #[error("flush timed out after {0:?}")]
    Timeout(Duration),

    /// Transaction start, row upsert or commit failed
    #[error("flush failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}
