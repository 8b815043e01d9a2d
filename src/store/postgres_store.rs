use crate::config::PoolConfig;
use crate::store::backend::{pool_options, StoreBackend};
use crate::store::manager::{BucketCount, BucketDelta, ClickStore};
use crate::store::migrations::{run_migrations, StoreMigrations};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::{PgPool, Postgres};
use std::fmt::{self, Debug, Formatter};

pub struct PostgresClickStore {
    backend: StoreBackend<Postgres>,
}

impl PostgresClickStore {
    pub async fn new(connection_string: &str, pool_config: &PoolConfig) -> Result<Self> {
        let pool = pool_options::<Postgres>(pool_config)
            .connect(connection_string)
            .await?;

        Ok(Self {
            backend: StoreBackend::new(pool),
        })
    }

    fn initialize_schema(pool: &PgPool) -> BoxFuture<'_, Result<()>> {
        async move {
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS clicks (
                    banner_id BIGINT NOT NULL,
                    bucket BIGINT NOT NULL,
                    count BIGINT NOT NULL DEFAULT 0,
                    PRIMARY KEY (banner_id, bucket)
                )",
            )
            .execute(pool)
            .await?;

            Ok(())
        }
        .boxed()
    }
}

struct PostgresMigrationBackend;

impl StoreMigrations for PostgresMigrationBackend {
    type Pool = PgPool;

    fn ensure_migrations_table(pool: &Self::Pool) -> BoxFuture<'_, Result<()>> {
        async move {
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version BIGINT PRIMARY KEY,
                    applied_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
                )",
            )
            .execute(pool)
            .await?;
            Ok(())
        }
        .boxed()
    }

    fn current_version(pool: &Self::Pool) -> BoxFuture<'_, Result<i64>> {
        async move {
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(pool)
                .await
                .map_err(Into::into)
        }
        .boxed()
    }

    fn record_version(pool: &Self::Pool, version: i64) -> BoxFuture<'_, Result<()>> {
        async move {
            sqlx::query("INSERT INTO schema_migrations (version) VALUES ($1)")
                .bind(version)
                .execute(pool)
                .await?;
            Ok(())
        }
        .boxed()
    }

    fn migrate_v1(pool: &Self::Pool) -> BoxFuture<'_, Result<()>> {
        PostgresClickStore::initialize_schema(pool)
    }
}

#[async_trait]
impl ClickStore for PostgresClickStore {
    async fn close(&self) -> Result<()> {
        self.backend.close().await;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<()> {
        run_migrations::<PostgresMigrationBackend>(self.backend.pool()).await
    }

    async fn upsert_counts(&self, bucket: DateTime<Utc>, deltas: &[BucketDelta]) -> Result<()> {
        self.backend.upsert_counts(bucket, deltas).await
    }

    async fn select_range(
        &self,
        banner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BucketCount>> {
        self.backend.select_range(banner_id, from, to).await
    }
}

impl Debug for PostgresClickStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresClickStore")
            .field("pool", self.backend.pool())
            .finish()
    }
}
