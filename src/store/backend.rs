//! Database backend abstraction for click storage.
//!
//! [`StoreBackend`] holds one sqlx pool and implements the write and read paths
//! once for every database that implements [`StoreDatabase`] (Postgres and
//! SQLite). The only dialect difference the queries care about is parameter
//! binding syntax; the upsert itself (`INSERT ... ON CONFLICT ... DO UPDATE`)
//! is accepted verbatim by both engines.
//!
//! # Example
//!
//! ```ignore
//! use clickstat::store::StoreBackend;
//! use sqlx::SqlitePool;
//!
//! let pool = SqlitePool::connect("sqlite:clicks.db?mode=rwc").await?;
//! let backend = StoreBackend::new(pool);
//! let rows = backend.select_range(42, from, to).await?;
//! ```

use crate::config::PoolConfig;
use crate::store::manager::{BucketCount, BucketDelta};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::pool::PoolOptions;
use sqlx::{
    query, query_as, ColumnIndex, Database, Decode, Encode, Executor, FromRow, IntoArguments,
    Pool, Postgres, Sqlite, Type,
};
use std::borrow::Cow;
use std::time::Duration;

/// Extension trait for sqlx databases that provides store-specific functionality.
pub trait StoreDatabase: Database {
    /// Returns the parameter placeholder for the given 1-based index.
    ///
    /// - Postgres uses `$1`, `$2`, etc.
    /// - SQLite uses `?` for all parameters (index is ignored).
    fn bind_param(index: usize) -> Cow<'static, str>;
}

impl StoreDatabase for Postgres {
    fn bind_param(index: usize) -> Cow<'static, str> {
        Cow::Owned(format!("${}", index))
    }
}

impl StoreDatabase for Sqlite {
    fn bind_param(_: usize) -> Cow<'static, str> {
        Cow::Borrowed("?")
    }
}

/// Pool options shared by both backends, built from `[storage.pool]`.
pub fn pool_options<DB: Database>(config: &PoolConfig) -> PoolOptions<DB> {
    PoolOptions::<DB>::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
        .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
        .max_lifetime(Some(Duration::from_secs(config.max_lifetime_secs)))
}

/// Smallest whole second that is not before `ts`.
///
/// Buckets are whole seconds, so a lower bound with a fractional part must not
/// admit the bucket at its floor.
fn lower_bound_secs(ts: DateTime<Utc>) -> i64 {
    if ts.timestamp_subsec_nanos() > 0 {
        ts.timestamp() + 1
    } else {
        ts.timestamp()
    }
}

/// Generic database backend for click storage.
pub struct StoreBackend<DB: StoreDatabase> {
    pool: Pool<DB>,
}

impl<DB: StoreDatabase> StoreBackend<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl<DB> StoreBackend<DB>
where
    DB: StoreDatabase,
    BucketCount: for<'r> FromRow<'r, DB::Row>,
    for<'q> i64: Encode<'q, DB> + Type<DB>,
    for<'r> i64: Decode<'r, DB>,
    for<'q> <DB as Database>::Arguments<'q>: IntoArguments<'q, DB> + Send,
    for<'c> &'c Pool<DB>: Executor<'c, Database = DB>,
    for<'c> &'c mut <DB as Database>::Connection: Executor<'c, Database = DB>,
    usize: ColumnIndex<DB::Row>,
{
    #[tracing::instrument(
        name = "store_upsert_counts",
        skip(self, deltas),
        fields(
            clickstat.bucket = %bucket,
            clickstat.rows = deltas.len(),
        )
    )]
    pub async fn upsert_counts(&self, bucket: DateTime<Utc>, deltas: &[BucketDelta]) -> Result<()> {
        if deltas.is_empty() {
            return Ok(());
        }

        // Saturates at i64::MAX; the comparison itself cannot overflow since
        // deltas are positive.
        let sql = format!(
            "INSERT INTO clicks (banner_id, bucket, count) VALUES ({p1}, {p2}, {p3}) \
             ON CONFLICT (banner_id, bucket) \
             DO UPDATE SET count = CASE \
                 WHEN clicks.count > {max} - excluded.count THEN {max} \
                 ELSE clicks.count + excluded.count \
             END",
            p1 = DB::bind_param(1),
            p2 = DB::bind_param(2),
            p3 = DB::bind_param(3),
            max = i64::MAX,
        );
        let bucket_secs = bucket.timestamp();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        for delta in deltas {
            // An early return drops `tx`, which rolls the whole batch back.
            query(&sql)
                .bind(delta.banner_id)
                .bind(bucket_secs)
                .bind(delta.amount)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to upsert banner {}", delta.banner_id))?;
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }

    pub async fn select_range(
        &self,
        banner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BucketCount>> {
        let sql = format!(
            "SELECT bucket, count FROM clicks \
             WHERE banner_id = {} AND bucket >= {} AND bucket <= {} \
             ORDER BY bucket",
            DB::bind_param(1),
            DB::bind_param(2),
            DB::bind_param(3),
        );

        query_as::<DB, BucketCount>(&sql)
            .bind(banner_id)
            .bind(lower_bound_secs(from))
            .bind(to.timestamp())
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }
}
