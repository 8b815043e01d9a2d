use chrono::{DateTime, TimeZone, Utc};
use clickstat::config::PoolConfig;
use clickstat::store::{BucketDelta, ClickStore, SqliteClickStore};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

async fn create_test_store() -> (SqliteClickStore, TempDir) {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("clicks.db");

    let store = SqliteClickStore::new(db_path.to_str().unwrap(), &PoolConfig::default())
        .await
        .unwrap();
    store.run_migrations().await.unwrap();

    (store, dir)
}

fn minute(m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, m, 0).unwrap()
}

fn delta(banner_id: i64, amount: i64) -> BucketDelta {
    BucketDelta { banner_id, amount }
}

#[tokio::test]
async fn test_empty_store_returns_no_rows() {
    let (store, _dir) = create_test_store().await;

    let rows = store.select_range(1, minute(0), minute(59)).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let (store, _dir) = create_test_store().await;

    store.upsert_counts(minute(0), &[delta(1, 3)]).await.unwrap();
    store.run_migrations().await.unwrap();
    store.run_migrations().await.unwrap();

    let rows = store.select_range(1, minute(0), minute(0)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, 3);
}

#[tokio::test]
async fn test_upsert_accumulates_instead_of_overwriting() {
    let (store, _dir) = create_test_store().await;

    store
        .upsert_counts(minute(5), &[delta(1, 2), delta(2, 7)])
        .await
        .unwrap();
    store.upsert_counts(minute(5), &[delta(1, 3)]).await.unwrap();

    let rows = store.select_range(1, minute(5), minute(5)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, 5);
    assert_eq!(rows[0].timestamp(), minute(5));

    let rows = store.select_range(2, minute(5), minute(5)).await.unwrap();
    assert_eq!(rows[0].count, 7);
}

#[tokio::test]
async fn test_range_query_is_inclusive_and_ordered() {
    let (store, _dir) = create_test_store().await;

    // Insert out of order to check ORDER BY.
    store.upsert_counts(minute(3), &[delta(1, 30)]).await.unwrap();
    store.upsert_counts(minute(1), &[delta(1, 10)]).await.unwrap();
    store.upsert_counts(minute(2), &[delta(1, 20)]).await.unwrap();
    store.upsert_counts(minute(2), &[delta(9, 99)]).await.unwrap();

    let rows = store.select_range(1, minute(1), minute(2)).await.unwrap();
    let got: Vec<(DateTime<Utc>, i64)> = rows.iter().map(|r| (r.timestamp(), r.count)).collect();
    assert_eq!(got, vec![(minute(1), 10), (minute(2), 20)]);
}

#[tokio::test]
async fn test_range_bounds_with_fractional_seconds() {
    let (store, _dir) = create_test_store().await;
    store.upsert_counts(minute(1), &[delta(1, 1)]).await.unwrap();

    let just_after = minute(1) + chrono::Duration::milliseconds(1);
    let rows = store
        .select_range(1, just_after, minute(10))
        .await
        .unwrap();
    assert!(rows.is_empty());

    let just_before = minute(1) - chrono::Duration::milliseconds(1);
    let rows = store.select_range(1, just_before, minute(1)).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_upserts_to_same_bucket_all_count() {
    let (store, _dir) = create_test_store().await;
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.upsert_counts(minute(7), &[delta(4, 5)]).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let rows = store.select_range(4, minute(7), minute(7)).await.unwrap();
    assert_eq!(rows[0].count, 40);
}

#[tokio::test]
async fn test_empty_delta_list_is_noop() {
    let (store, _dir) = create_test_store().await;

    store.upsert_counts(minute(0), &[]).await.unwrap();
    assert!(store.select_range(1, minute(0), minute(0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upsert_saturates_instead_of_overflowing() {
    let (store, _dir) = create_test_store().await;

    store
        .upsert_counts(minute(8), &[delta(1, i64::MAX)])
        .await
        .unwrap();
    store.upsert_counts(minute(8), &[delta(1, 1)]).await.unwrap();
    store
        .upsert_counts(minute(8), &[delta(1, i64::MAX)])
        .await
        .unwrap();

    let rows = store.select_range(1, minute(8), minute(8)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, i64::MAX);
}

#[tokio::test]
async fn test_failed_row_rolls_back_whole_batch() {
    let (store, dir) = create_test_store().await;

    // Second connection to install a trigger that rejects banner 2.
    let db_path = dir.path().join("clicks.db");
    let admin = sqlx::SqlitePool::connect(&format!("sqlite:{}", db_path.display()))
        .await
        .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_banner_two BEFORE INSERT ON clicks \
         WHEN NEW.banner_id = 2 \
         BEGIN SELECT RAISE(ABORT, 'banner 2 rejected'); END",
    )
    .execute(&admin)
    .await
    .unwrap();
    admin.close().await;

    let result = store
        .upsert_counts(minute(9), &[delta(1, 5), delta(2, 1), delta(3, 7)])
        .await;
    assert!(result.is_err());

    for banner_id in [1, 2, 3] {
        let rows = store
            .select_range(banner_id, minute(9), minute(9))
            .await
            .unwrap();
        assert!(rows.is_empty(), "banner {banner_id} should have been rolled back");
    }

    // The pool is still usable after the rollback.
    store.upsert_counts(minute(9), &[delta(1, 5)]).await.unwrap();
    let rows = store.select_range(1, minute(9), minute(9)).await.unwrap();
    assert_eq!(rows[0].count, 5);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (store, _dir) = create_test_store().await;

    store.close().await.unwrap();
    store.close().await.unwrap();
}
