use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;

use super::{bulk, fast_config, reply, test_engine};
use crate::core::error::CoreError;
use crate::core::jobs::{JobPayload, JobStatus, SubmitOptions};
use crate::core::remote::mock::MockActionClient;

#[tokio::test]
async fn bulk_offsets_are_cumulative_and_within_range() {
    let engine = test_engine(Arc::new(MockActionClient::new()), fast_config());
    let before = Utc::now();
    let jobs = engine
        .submit_bulk(bulk(vec![reply("1"), reply("2"), reply("3")]), (40, 90))
        .await
        .unwrap();

    let mut previous = before;
    for (k, job) in jobs.iter().enumerate() {
        assert_eq!(job.status, JobStatus::Scheduled);
        let at = job.scheduled_at.unwrap();
        let gap = (at - previous).num_seconds();
        assert!((40..=90).contains(&gap), "gap {} out of range", gap);
        previous = at;

        let progress = job.progress.as_ref().unwrap();
        assert_eq!(progress.current, k + 1);
        assert_eq!(progress.total, 3);
    }

    let batch = jobs[0].batch_id.as_deref().unwrap();
    assert!(jobs.iter().all(|j| j.batch_id.as_deref() == Some(batch)));
}

#[tokio::test]
async fn later_batch_queues_behind_the_earlier_one() {
    let engine = test_engine(Arc::new(MockActionClient::new()), fast_config());
    let first = engine
        .submit_bulk(bulk(vec![reply("1"), reply("2")]), (60, 60))
        .await
        .unwrap();
    let first_tail = first.last().unwrap().scheduled_at.unwrap();

    let second = engine
        .submit_bulk(bulk(vec![reply("3")]), (60, 60))
        .await
        .unwrap();
    assert!(second[0].scheduled_at.unwrap() > first_tail);
}

#[tokio::test]
async fn empty_bulk_submission_is_rejected() {
    let engine = test_engine(Arc::new(MockActionClient::new()), fast_config());
    let err = engine.submit_bulk(Vec::new(), (1, 2)).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn cancelled_job_never_reaches_the_remote_side() {
    let client = Arc::new(MockActionClient::new());
    let engine = test_engine(Arc::clone(&client), fast_config());
    let jobs = engine
        .submit_bulk(bulk(vec![reply("1")]), (600, 600))
        .await
        .unwrap();

    let cancelled = engine.cancel(&jobs[0].id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    engine.tick().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.reply_calls.load(Ordering::SeqCst), 0);

    let stored = engine.get(&jobs[0].id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert!(stored.completed_at.is_none());
}

#[tokio::test]
async fn cancel_rejects_unknown_and_terminal_jobs() {
    let engine = test_engine(Arc::new(MockActionClient::new()), fast_config());
    let err = engine.cancel("no-such-job").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let jobs = engine
        .submit_bulk(bulk(vec![reply("1")]), (600, 600))
        .await
        .unwrap();
    engine.cancel(&jobs[0].id).await.unwrap();
    let err = engine.cancel(&jobs[0].id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotCancellable(_)));
}

#[tokio::test]
async fn running_job_is_not_abortable() {
    let client =
        Arc::new(MockActionClient::new().with_reply_latency(Duration::from_millis(200)));
    let engine = test_engine(Arc::clone(&client), fast_config());
    let job = engine
        .submit(JobPayload::Reply(reply("1")), SubmitOptions::default())
        .await
        .unwrap();

    engine.tick().await;
    let err = engine.cancel(&job.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotCancellable(_)));

    // The in-flight call still runs to completion.
    super::wait_until(Duration::from_secs(2), || async {
        engine.get(&job.id).await.unwrap().status == JobStatus::Completed
    })
    .await;
}

#[tokio::test]
async fn cancel_all_sweeps_once_then_finds_nothing() {
    let engine = test_engine(Arc::new(MockActionClient::new()), fast_config());
    engine
        .submit_bulk(bulk(vec![reply("1"), reply("2"), reply("3")]), (600, 600))
        .await
        .unwrap();

    assert_eq!(engine.cancel_all().await, 3);
    assert_eq!(engine.cancel_all().await, 0);

    let (_, summary) = engine.snapshot().await;
    assert_eq!(summary.cancelled, 3);
}
