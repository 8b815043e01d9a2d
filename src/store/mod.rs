mod backend;
mod manager;
mod migrations;
mod mock_store;
mod postgres_store;
mod sqlite_store;

pub use backend::{StoreBackend, StoreDatabase};
pub use manager::{BucketCount, BucketDelta, ClickStore};
pub use mock_store::{MockStore, RecordedFlush};
pub use postgres_store::PostgresClickStore;
pub use sqlite_store::SqliteClickStore;

use crate::config::StorageConfig;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Connect the store described by `config` and bring its schema up to date.
///
/// Any failure here is fatal: the server refuses to start without storage.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn ClickStore>> {
    let store: Arc<dyn ClickStore> = match config.storage_type.as_str() {
        "postgres" => Arc::new(
            PostgresClickStore::new(&config.postgres_url()?, &config.pool)
                .await
                .context("Failed to connect to postgres store")?,
        ),
        "sqlite" => Arc::new(
            SqliteClickStore::new(&config.path, &config.pool)
                .await
                .context("Failed to open sqlite store")?,
        ),
        other => anyhow::bail!("Invalid storage type: {}", other),
    };

    store.run_migrations().await?;
    Ok(store)
}
