use chrono::{Duration, Utc};
use mockinterview_api::{
    models::{stats::AttemptRecord, Difficulty, InterviewSettings},
    services::{
        redis_store::RedisSessionStore,
        session_store::{SessionStore, StoreError},
    },
};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use uuid::Uuid;

async fn store() -> RedisSessionStore {
    let uri = std::env::var("REDIS_URI").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());
    let client = redis::Client::open(uri).expect("valid REDIS_URI");
    let conn = ConnectionManager::new(client)
        .await
        .expect("Redis is reachable");
    // unique prefix keeps runs independent
    RedisSessionStore::with_prefix(conn, format!("test:{}", Uuid::new_v4()))
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_session_lifecycle() {
    let store = store().await;
    let started = Utc::now();

    let session = store
        .create(InterviewSettings::default(), started)
        .await
        .unwrap();
    assert_eq!(store.get(&session.id).await.unwrap(), session);

    let (ended, completed) = store
        .end(&session.id, started + Duration::minutes(42))
        .await
        .unwrap();
    assert!(completed);
    assert_eq!(ended.duration_minutes, Some(42));

    let (again, completed_again) = store
        .end(&session.id, started + Duration::minutes(50))
        .await
        .unwrap();
    assert!(!completed_again);
    assert_eq!(again, ended);

    assert!(matches!(
        store.get("missing").await,
        Err(StoreError::NotFound(_))
    ));
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_concurrent_updates_are_not_lost() {
    let store = Arc::new(store().await);
    let session = store
        .create(InterviewSettings::default(), Utc::now())
        .await
        .unwrap();

    let tasks = (0..10u32).map(|i| {
        let store = store.clone();
        let id = session.id.clone();
        async move {
            store
                .record_attempt(&AttemptRecord {
                    session_id: Some(id.clone()),
                    difficulty: Difficulty::Hard,
                    tags: vec!["Graph".to_string()],
                    overall_score: i * 10,
                })
                .await
                .unwrap();
            // a CAS conflict may surface after three lost races
            let _ = store.increment_attempts(&id).await;
        }
    });
    futures::future::join_all(tasks).await;

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_attempts, 10);
    assert_eq!(stats.average_score, 45);
    assert_eq!(stats.favorite_difficulty, Difficulty::Hard);
    assert_eq!(stats.improvement_areas, vec!["Graph".to_string()]);
    assert_eq!(stats.recent_sessions.len(), 1);

    let attempts = store.get(&session.id).await.unwrap().questions_attempted;
    assert!((1..=10).contains(&attempts));
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_hint_limit_is_enforced() {
    let store = store().await;
    let session = store
        .create(InterviewSettings::default(), Utc::now())
        .await
        .unwrap();

    let taken = store.consume_hint(&session.id, "two-sum", 2, 1).await.unwrap();
    assert_eq!(taken.hints_used, 1);
    assert_eq!(taken.hints_taken_for("two-sum"), 1);
    assert!(matches!(
        store.consume_hint(&session.id, "coin-change", 2, 1).await,
        Err(StoreError::Rejected(_))
    ));
    store.ping().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_concurrent_end_completes_once() {
    let store = Arc::new(store().await);
    let session = store
        .create(InterviewSettings::default(), Utc::now())
        .await
        .unwrap();

    let tasks = (0..5).map(|_| {
        let store = store.clone();
        let id = session.id.clone();
        async move { store.end(&id, Utc::now()).await }
    });
    let results = futures::future::join_all(tasks).await;

    let completed = results
        .iter()
        .filter(|r| matches!(r, Ok((_, true))))
        .count();
    assert_eq!(completed, 1);
}
