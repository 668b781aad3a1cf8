use whoru_detect::{
    db::{self, queries::PgJobStore},
    models::job::JobStatus,
    services::{
        job_store::{JobStore, StoreError},
        queue::{JobQueue, QueuedJob, RedisJobQueue},
    },
};

/// Integration test: job lifecycle against PostgreSQL
///
/// Exercises the schema, the guarded terminal transition and the
/// newest-first history ordering on a real database.
///
/// Note: This requires a running PostgreSQL instance configured via DATABASE_URL.
#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_postgres_job_lifecycle() {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = db::init_pool(&database_url, 2, 1)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let store = PgJobStore::new(pool);
    store.ping().await.expect("Database ping failed");

    let owner = format!("it-{}", uuid::Uuid::new_v4());

    // 1. Creation
    let first = store.create(&owner, "1-aaaa-first.mp4").await.expect("create");
    let second = store.create(&owner, "2-bbbb-second.png").await.expect("create");
    assert_eq!(first.status, JobStatus::Pending);
    assert!(first.verdict.is_none());

    // 2. Pending jobs are visible to recovery
    let pending = store.list_pending(10_000).await.expect("list pending");
    assert!(pending.iter().any(|j| j.id == first.id));

    // 3. Terminal transition happens once
    store
        .complete(first.id, "此影片是偽造影片", 1200)
        .await
        .expect("complete");
    let again = store.fail(first.id, "late failure", 1).await;
    assert!(matches!(again, Err(StoreError::AlreadyTerminal(id)) if id == first.id));

    let done = store.get(first.id).await.expect("get").expect("job exists");
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.verdict.as_deref(), Some("此影片是偽造影片"));
    assert_eq!(done.processing_duration_ms, Some(1200));
    assert!(done.completed_at.is_some());

    // 4. Failure keeps the error summary
    store
        .fail(second.id, "Analysis routine timed out", 10)
        .await
        .expect("fail");
    let failed = store.get(second.id).await.expect("get").expect("job exists");
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.wire_result(), "Failed");

    // 5. History is newest first
    let history = store.list_by_owner(&owner).await.expect("history");
    let ids: Vec<_> = history.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    // 6. Unknown ids
    let missing = uuid::Uuid::new_v4();
    assert!(store.get(missing).await.expect("get").is_none());
    assert!(matches!(
        store.complete(missing, "x", 0).await,
        Err(StoreError::NotFound(id)) if id == missing
    ));
}

/// Integration test: Redis queue hand-off
///
/// Note: This requires a dedicated Redis instance configured via REDIS_URL;
/// other consumers of the same keys would race for the job.
#[tokio::test]
#[ignore]
async fn test_redis_queue_roundtrip() {
    dotenvy::dotenv().ok();
    let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");

    let queue = RedisJobQueue::new(&redis_url).expect("Failed to initialize queue");
    queue.health_check().await.expect("Redis ping failed");

    let job = QueuedJob {
        job_id: uuid::Uuid::new_v4(),
        asset_ref: "1-cccc-queued.mp4".to_string(),
    };

    let before = queue.depth().await.expect("depth");
    queue.enqueue(&job).await.expect("Failed to enqueue");
    assert_eq!(queue.depth().await.expect("depth"), before + 1);

    // Drain anything older than our job, acknowledging as we go.
    let dequeued = loop {
        let next = queue
            .dequeue()
            .await
            .expect("Failed to dequeue")
            .expect("Job missing from queue");
        if next == job {
            break next;
        }
        queue.complete(&next).await.expect("ack");
    };

    queue
        .complete(&dequeued)
        .await
        .expect("Failed to complete job in queue");
}
