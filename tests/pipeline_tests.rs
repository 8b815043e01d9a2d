use chrono::Utc;
use clickstat::config::PoolConfig;
use clickstat::pipeline::{CounterId, WorkerConfig};
use clickstat::store::{ClickStore, SqliteClickStore};
use clickstat::ClickEngine;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

struct TestContext {
    engine: Arc<ClickEngine>,
    db_path: String,
    _dir: TempDir,
}

async fn setup(queue_capacity: usize, worker: WorkerConfig) -> TestContext {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("clicks.db").to_str().unwrap().to_string();

    let store = SqliteClickStore::new(&db_path, &PoolConfig::default())
        .await
        .unwrap();
    store.run_migrations().await.unwrap();

    let engine = ClickEngine::builder()
        .store(Arc::new(store))
        .queue_capacity(queue_capacity)
        .worker_config(worker)
        .build()
        .await
        .unwrap();

    TestContext {
        engine: Arc::new(engine),
        db_path,
        _dir: dir,
    }
}

/// Sum of everything stored for `banner_id` in the last/next hour, read
/// through a fresh pool after the engine has shut down.
async fn stored_total(db_path: &str, banner_id: i64) -> i64 {
    let store = SqliteClickStore::new(db_path, &PoolConfig::default())
        .await
        .unwrap();
    let from = Utc::now() - chrono::Duration::hours(1);
    let to = Utc::now() + chrono::Duration::hours(1);
    store
        .select_range(banner_id, from, to)
        .await
        .unwrap()
        .iter()
        .map(|row| row.count)
        .sum()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_counts_within_one_flush_are_summed() {
    let ctx = setup(
        1_000,
        WorkerConfig {
            batch_size: 1_000,
            flush_interval: Duration::from_secs(3600),
            flush_timeout: Duration::from_secs(5),
        },
    )
    .await;

    let amounts = [1, 4, 2, 7, 1, 1, 9];
    for amount in amounts {
        ctx.engine.submit(CounterId(1), amount).await.unwrap();
    }
    ctx.engine.submit(CounterId(2), 100).await.unwrap();
    ctx.engine.shutdown().await.unwrap();

    let snapshot = ctx.engine.pipeline_stats();
    assert_eq!(snapshot.flushes, 1);
    assert_eq!(snapshot.rows_upserted, 2);

    assert_eq!(stored_total(&ctx.db_path, 1).await, amounts.iter().sum::<i64>());
    assert_eq!(stored_total(&ctx.db_path, 2).await, 100);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_consecutive_flushes_merge_into_existing_rows() {
    let ctx = setup(
        1_000,
        WorkerConfig {
            batch_size: 3,
            flush_interval: Duration::from_secs(3600),
            flush_timeout: Duration::from_secs(5),
        },
    )
    .await;

    for _ in 0..9 {
        ctx.engine.submit(CounterId(5), 2).await.unwrap();
    }
    ctx.engine.shutdown().await.unwrap();

    assert_eq!(ctx.engine.pipeline_stats().flushes, 3);
    assert_eq!(stored_total(&ctx.db_path, 5).await, 18);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_saturated_queue_applies_backpressure_without_loss() {
    let ctx = setup(
        2,
        WorkerConfig {
            batch_size: 1,
            flush_interval: Duration::from_secs(3600),
            flush_timeout: Duration::from_secs(5),
        },
    )
    .await;

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let engine = ctx.engine.clone();
            tokio::spawn(async move {
                for _ in 0..25 {
                    engine.submit(CounterId(3), 1).await.unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        tokio::time::timeout(Duration::from_secs(30), producer)
            .await
            .expect("producers should make progress as the worker drains")
            .unwrap();
    }
    ctx.engine.shutdown().await.unwrap();

    let snapshot = ctx.engine.pipeline_stats();
    assert_eq!(snapshot.events_accepted, 100);
    assert_eq!(snapshot.events_flushed, 100);
    assert_eq!(snapshot.events_lost, 0);
    assert_eq!(stored_total(&ctx.db_path, 3).await, 100);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_events_submitted_right_before_shutdown_are_persisted() {
    let ctx = setup(
        1_000,
        WorkerConfig {
            batch_size: 1_000,
            flush_interval: Duration::from_secs(3600),
            flush_timeout: Duration::from_secs(5),
        },
    )
    .await;

    for i in 0..50 {
        ctx.engine.submit(CounterId(i % 2), 1).await.unwrap();
    }
    ctx.engine.shutdown().await.unwrap();

    assert_eq!(stored_total(&ctx.db_path, 0).await, 25);
    assert_eq!(stored_total(&ctx.db_path, 1).await, 25);
}
