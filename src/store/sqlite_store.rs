use crate::config::PoolConfig;
use crate::store::backend::{pool_options, StoreBackend};
use crate::store::manager::{BucketCount, BucketDelta, ClickStore};
use crate::store::migrations::{run_migrations, StoreMigrations};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::{Sqlite, SqlitePool};
use std::fmt::{self, Debug, Formatter};

pub struct SqliteClickStore {
    backend: StoreBackend<Sqlite>,
    db_path: String,
}

impl Debug for SqliteClickStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteClickStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

struct SqliteMigrationBackend;

impl SqliteClickStore {
    pub async fn new(db_path: &str, pool_config: &PoolConfig) -> Result<Self> {
        let uri = format!("sqlite:{}?mode=rwc", db_path);
        let pool = pool_options::<Sqlite>(pool_config).connect(&uri).await?;

        Ok(Self {
            backend: StoreBackend::new(pool),
            db_path: db_path.to_string(),
        })
    }

    fn initialize_schema(pool: &SqlitePool) -> BoxFuture<'_, Result<()>> {
        async move {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS clicks (
                    banner_id INTEGER NOT NULL,
                    bucket INTEGER NOT NULL,
                    count INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (banner_id, bucket)
                )
                "#,
            )
            .execute(pool)
            .await?;

            Ok(())
        }
        .boxed()
    }
}

#[async_trait]
impl ClickStore for SqliteClickStore {
    async fn close(&self) -> Result<()> {
        self.backend.close().await;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<()> {
        run_migrations::<SqliteMigrationBackend>(self.backend.pool()).await
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

impl StoreMigrations for SqliteMigrationBackend {
    type Pool = SqlitePool;

    fn ensure_migrations_table(pool: &Self::Pool) -> BoxFuture<'_, Result<()>> {
        async move {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )
                "#,
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
            sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
                .bind(version)
                .execute(pool)
                .await?;
            Ok(())
        }
        .boxed()
    }

    fn migrate_v1(pool: &Self::Pool) -> BoxFuture<'_, Result<()>> {
        SqliteClickStore::initialize_schema(pool)
    }
}
