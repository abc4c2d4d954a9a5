//! Tests for `RedisJobStore` against a live server.
//!
//! Ignored by default. Run with a Redis instance reachable at `REDIS_URL`
//! (default `redis://127.0.0.1:6379`):
//!
//! ```text
//! cargo test -p wecode-jobs --test redis_store -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use wecode_core::job::{status_key, CodeSubmission, WorkItem};
use wecode_core::types::JobId;
use wecode_jobs::{JobDispatcher, JobStatusReader, JobStore, JobsError, RedisJobStore};

async fn connect() -> RedisJobStore {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
    RedisJobStore::connect(&url)
        .await
        .expect("Redis should be reachable for ignored tests")
}

/// A queue name unique to this test run so parallel tests don't interfere.
fn scratch_queue() -> String {
    format!("test-queue:{}", JobId::generate())
}

// ---------------------------------------------------------------------------
// Test: ping succeeds
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_URL"]
async fn ping_succeeds() {
    connect().await.ping().await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: LPUSH / BRPOP pairing is FIFO
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_URL"]
async fn queue_is_fifo() {
    let store = connect().await;
    let queue = scratch_queue();

    store.push(&queue, "first").await.unwrap();
    store.push(&queue, "second").await.unwrap();

    let timeout = Duration::from_secs(1);
    assert_eq!(store.pop(&queue, timeout).await.unwrap().as_deref(), Some("first"));
    assert_eq!(store.pop(&queue, Duration::ZERO).await.unwrap().as_deref(), Some("second"));
    assert_eq!(store.pop(&queue, Duration::ZERO).await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Test: submit then read back through Redis
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_URL"]
async fn submit_and_poll_round_trip() {
    let store: Arc<dyn JobStore> = Arc::new(connect().await);
    let queue = scratch_queue();
    let dispatcher = JobDispatcher::new(Arc::clone(&store), queue.clone());
    let reader = JobStatusReader::new(Arc::clone(&store));

    let job_id = dispatcher
        .submit(&CodeSubmission {
            code: "print(1)".into(),
            language: "python".into(),
        })
        .await
        .unwrap();

    let record = reader.get_status(&job_id.to_string()).await.unwrap();
    assert_eq!(record["status"], "pending");

    let raw = store.pop(&queue, Duration::from_secs(1)).await.unwrap().unwrap();
    assert_eq!(WorkItem::decode(&raw).unwrap().job_id(), job_id);

    store
        .put_fields(&status_key(&job_id.to_string()), &[("status", "done"), ("output", "1")])
        .await
        .unwrap();
    let record = reader.get_status(&job_id.to_string()).await.unwrap();
    assert_eq!(record["status"], "done");
    assert_eq!(record["output"], "1");
}

// ---------------------------------------------------------------------------
// Test: unknown job id is not found
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_URL"]
async fn unknown_job_is_not_found() {
    let reader = JobStatusReader::new(Arc::new(connect().await));
    let result = reader.get_status("nonexistent-id").await;
    assert!(matches!(result, Err(JobsError::NotFound(_))));
}

// ---------------------------------------------------------------------------
// Test: a waiting pop does not hold up a pop on another queue
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_URL"]
async fn concurrent_blocking_pops_do_not_serialize() {
    let store = Arc::new(connect().await);
    let idle_queue = scratch_queue();
    let busy_queue = scratch_queue();

    let idle = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.pop(&idle_queue, Duration::from_secs(3)).await })
    };
    // Let the first BRPOP start waiting.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = std::time::Instant::now();
    let busy = {
        let store = Arc::clone(&store);
        let queue = busy_queue.clone();
        tokio::spawn(async move { store.pop(&queue, Duration::from_secs(3)).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    store.push(&busy_queue, "work").await.unwrap();

    let popped = busy.await.unwrap().unwrap();
    assert_eq!(popped.as_deref(), Some("work"));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "pop on a busy queue waited behind an idle one: {:?}",
        started.elapsed()
    );

    assert_eq!(idle.await.unwrap().unwrap(), None);
}
