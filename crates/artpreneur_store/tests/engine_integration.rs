//! Integration tests for HealthScoreEngine over a real SQLite database.
//!
//! Uses tempfile::TempDir for isolated databases.

use std::sync::Arc;

use artpreneur_core::{
    ActivityStore, FixedClock, HealthScoreEngine, HealthScoreError, ScoringConfig,
};
use artpreneur_store::SqliteStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

fn pinned_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap()
}

async fn setup(dir: &tempfile::TempDir) -> (HealthScoreEngine, Arc<SqliteStore>) {
    let db_path = dir.path().join("test.db");
    let store = Arc::new(SqliteStore::new(db_path.to_str().unwrap()).await.unwrap());
    let engine = HealthScoreEngine::new(store.clone(), ScoringConfig::default())
        .with_clock(Arc::new(FixedClock(pinned_now())));
    (engine, store)
}

/// Test 1: a busy month scores as expected and is stored
#[tokio::test]
async fn test_busy_month() {
    let dir = tempfile::TempDir::new().unwrap();
    let (engine, store) = setup(&dir).await;
    let user = Uuid::new_v4();
    let now = pinned_now();

    for d in 0..3 {
        store.record_valuation(user, now - Duration::days(d)).await.unwrap();
    }
    store.record_pricing_calculation(user, 400.0, now - Duration::days(1)).await.unwrap();
    store.record_expense(user, 200.0, "materials", now.date_naive()).await.unwrap();
    let post = store.record_forum_post(user, now).await.unwrap();
    store.record_forum_comment(user, Some(post), now).await.unwrap();

    let scores = engine.calculate(user).await.unwrap();
    assert_eq!(scores.productivity_score, 60);
    assert_eq!(scores.financial_health_score, 50.0);
    assert_eq!(scores.learning_engagement_score, 50);
    assert_eq!(scores.community_participation_score, 20);
    // 18 + 15 + 10 + 4
    assert_eq!(scores.overall_score, 47);

    let stored = store.load_health_score(user).await.unwrap().unwrap();
    assert_eq!(stored.scores, scores);
    assert_eq!(stored.last_calculated_at, now);
}

/// Test 2: repeated runs with a pinned clock are identical and upsert one row
#[tokio::test]
async fn test_idempotent_with_pinned_clock() {
    let dir = tempfile::TempDir::new().unwrap();
    let (engine, store) = setup(&dir).await;
    let user = Uuid::new_v4();
    store.record_valuation(user, pinned_now()).await.unwrap();

    let a = engine.calculate(user).await.unwrap();
    let b = engine.calculate(user).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(store.count_health_scores().await.unwrap(), 1);
}

/// Test 3: concurrent invocations for the same user still leave one row
#[tokio::test]
async fn test_concurrent_same_user() {
    let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
    let engine = HealthScoreEngine::new(store.clone(), ScoringConfig::default())
        .with_clock(Arc::new(FixedClock(pinned_now())));
    let user = Uuid::new_v4();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.calculate(user).await })
        })
        .collect();
    for h in handles {
        assert!(h.await.unwrap().is_ok());
    }
    assert_eq!(store.count_health_scores().await.unwrap(), 1);
}

/// Test 4: an unreachable store fails as a data access error
#[tokio::test]
async fn test_store_outage_is_data_access_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let (engine, store) = setup(&dir).await;
    store.close().await;

    let err = engine.calculate(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, HealthScoreError::DataAccess(_)));
}

/// Test 5: data survives reopening the database
#[tokio::test]
async fn test_score_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let user = Uuid::new_v4();
    {
        let (engine, _store) = setup(&dir).await;
        engine.calculate(user).await.unwrap();
    }
    let (engine, _store) = setup(&dir).await;
    let record = engine.current(user).await.unwrap().unwrap();
    assert_eq!(record.scores.overall_score, 25);
}
