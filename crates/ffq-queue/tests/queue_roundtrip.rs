//! Queue integration tests. These need a reachable Redis (REDIS_ADDR).

use std::time::Duration;

use ffq_queue::{EnqueueOpts, FailOutcome, TaskQueue, TaskState};

fn test_opts() -> EnqueueOpts {
    EnqueueOpts {
        max_retry: 2,
        timeout: Duration::from_secs(60),
        retention: Duration::from_secs(300),
    }
}

fn unique_queue(tag: &str) -> String {
    format!("test-{tag}-{}", uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn enqueue_lease_complete_round_trip() {
    dotenvy::dotenv().ok();

    let queue = TaskQueue::from_env().expect("create queue");
    queue.ping().await.expect("ping");
    let q = unique_queue("roundtrip");

    let id = queue
        .enqueue(&q, br#"{"kind":"demo"}"#, test_opts())
        .await
        .expect("enqueue");

    let info = queue.task_info(&q, &id).await.expect("task info");
    assert_eq!(info.state, TaskState::Pending);
    assert_eq!(info.retried, 0);
    assert!(info.result.is_none());

    let leased = queue
        .dequeue(&q, "test-consumer")
        .await
        .expect("dequeue")
        .expect("task available");
    assert_eq!(leased.id, id);
    assert_eq!(leased.payload, br#"{"kind":"demo"}"#.to_vec());

    let info = queue.task_info(&q, &id).await.unwrap();
    assert_eq!(info.state, TaskState::Active);

    queue
        .complete(&q, &id, Some(br#"{"ok":true}"#))
        .await
        .expect("complete");

    let info = queue.task_info(&q, &id).await.unwrap();
    assert_eq!(info.state, TaskState::Completed);
    assert_eq!(info.result.as_deref(), Some(&b"{\"ok\":true}"[..]));
    assert!(info.completed_at.is_some());

    let completed = queue.list(&q, TaskState::Completed, 100).await.unwrap();
    assert!(completed.iter().any(|t| t.id == id));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn charged_failures_exhaust_the_budget() {
    dotenvy::dotenv().ok();

    let queue = TaskQueue::from_env().expect("create queue");
    let q = unique_queue("budget");

    let id = queue.enqueue(&q, b"{}", test_opts()).await.unwrap();

    // max_retry = 2 allows three attempts in total.
    for attempt in 1..=2 {
        let outcome = queue.fail(&q, &id, "boom").await.unwrap();
        assert_eq!(outcome, FailOutcome::Retrying, "attempt {attempt}");
        let info = queue.task_info(&q, &id).await.unwrap();
        assert_eq!(info.retried, attempt);
        assert_eq!(info.state, TaskState::Retry);
    }

    let outcome = queue.fail(&q, &id, "boom final").await.unwrap();
    assert_eq!(outcome, FailOutcome::Archived);

    let info = queue.task_info(&q, &id).await.unwrap();
    assert_eq!(info.state, TaskState::Archived);
    assert_eq!(info.last_error.as_deref(), Some("boom final"));

    let archived = queue.list(&q, TaskState::Archived, 100).await.unwrap();
    assert!(archived.iter().any(|t| t.id == id));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn uncharged_retries_leave_the_counter_alone() {
    dotenvy::dotenv().ok();

    let queue = TaskQueue::from_env().expect("create queue");
    let q = unique_queue("admission");

    let id = queue.enqueue(&q, b"{}", test_opts()).await.unwrap();
    queue.dequeue(&q, "c1").await.unwrap().unwrap();

    // Many admission rejections must never touch the retry counter.
    for _ in 0..10 {
        let outcome = queue
            .retry_later(&q, &id, "resource limit: memory usage too high: 99.0%", false)
            .await
            .unwrap();
        assert_eq!(outcome, FailOutcome::Retrying);
    }

    let info = queue.task_info(&q, &id).await.unwrap();
    assert_eq!(info.retried, 0);
    assert_eq!(info.state, TaskState::Retry);
    assert!(info
        .last_error
        .as_deref()
        .unwrap()
        .starts_with("resource limit"));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn dequeue_is_fifo_and_empty_queue_yields_none() {
    dotenvy::dotenv().ok();

    let queue = TaskQueue::from_env().expect("create queue");
    let q = unique_queue("fifo");

    assert!(queue.dequeue(&q, "c1").await.unwrap().is_none());

    let first = queue.enqueue(&q, b"1", test_opts()).await.unwrap();
    let second = queue.enqueue(&q, b"2", test_opts()).await.unwrap();
    assert_eq!(queue.queue_len(&q).await.unwrap(), 2);

    let a = queue.dequeue(&q, "c1").await.unwrap().unwrap();
    let b = queue.dequeue(&q, "c1").await.unwrap().unwrap();
    assert_eq!(a.id, first);
    assert_eq!(b.id, second);
    assert!(queue.dequeue(&q, "c1").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn archive_preserves_the_error_and_skips_retry() {
    dotenvy::dotenv().ok();

    let queue = TaskQueue::from_env().expect("create queue");
    let q = unique_queue("archive");

    let id = queue.enqueue(&q, b"not json", test_opts()).await.unwrap();
    queue.dequeue(&q, "c1").await.unwrap().unwrap();
    queue
        .archive(&q, &id, "unmarshal payload: invalid")
        .await
        .unwrap();

    let info = queue.task_info(&q, &id).await.unwrap();
    assert_eq!(info.state, TaskState::Archived);
    assert_eq!(info.retried, 0);
    assert_eq!(info.last_error.as_deref(), Some("unmarshal payload: invalid"));
}
