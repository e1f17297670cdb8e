use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use super::{bulk, fast_config, reply, test_engine, wait_until};
use crate::core::error::CoreError;
use crate::core::jobs::engine::EngineConfig;
use crate::core::jobs::{DmPayload, JobPayload, JobStatus, SubmitOptions};
use crate::core::remote::mock::MockActionClient;
use crate::core::remote::ReplyOutcome;

#[tokio::test]
async fn pending_reply_runs_on_the_next_tick() {
    let client = Arc::new(MockActionClient::new());
    client.script_reply(Ok(ReplyOutcome {
        reply_id: "999".to_string(),
        reply_url: "https://x.com/i/status/999".to_string(),
    }));
    let engine = test_engine(Arc::clone(&client), fast_config());

    let job = engine
        .submit(JobPayload::Reply(reply("42")), SubmitOptions::default())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    engine.tick().await;
    wait_until(Duration::from_secs(2), || async {
        engine.get(&job.id).await.unwrap().status.is_terminal()
    })
    .await;

    let done = engine.get(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(
        done.result.unwrap().reply_url(),
        Some("https://x.com/i/status/999")
    );
    assert_eq!(client.reply_calls.load(Ordering::SeqCst), 1);

    // Timestamps advance monotonically through the lifecycle.
    assert!(done.scheduled_at.unwrap() >= done.created_at);
    assert!(done.started_at.unwrap() >= done.scheduled_at.unwrap());
    assert!(done.completed_at.unwrap() >= done.started_at.unwrap());
}

#[tokio::test]
async fn scheduled_reply_waits_for_its_due_time() {
    let client = Arc::new(MockActionClient::new());
    let engine = test_engine(Arc::clone(&client), fast_config());

    let job = engine
        .submit(
            JobPayload::Reply(reply("42")),
            SubmitOptions {
                run_at: Some(Utc::now() + ChronoDuration::seconds(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Scheduled);

    engine.tick().await;
    assert_eq!(engine.get(&job.id).await.unwrap().status, JobStatus::Scheduled);
    assert_eq!(client.reply_calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    engine.tick().await;
    wait_until(Duration::from_secs(2), || async {
        engine.get(&job.id).await.unwrap().status == JobStatus::Completed
    })
    .await;
    assert_eq!(client.reply_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_failures_are_isolated_per_job() {
    let client = Arc::new(MockActionClient::new());
    client.script_reply(Ok(ReplyOutcome {
        reply_id: "a".to_string(),
        reply_url: "https://x.com/i/status/a".to_string(),
    }));
    client.script_reply(Err(CoreError::RemoteCall("boom".to_string())));
    client.script_reply(Ok(ReplyOutcome {
        reply_id: "c".to_string(),
        reply_url: "https://x.com/i/status/c".to_string(),
    }));
    let engine = test_engine(Arc::clone(&client), fast_config());

    let jobs = engine
        .submit_bulk(bulk(vec![reply("1"), reply("2"), reply("3")]), (0, 0))
        .await
        .unwrap();

    engine.tick().await;
    wait_until(Duration::from_secs(2), || async {
        let (_, summary) = engine.snapshot().await;
        summary.completed + summary.failed == 3
    })
    .await;

    let (_, summary) = engine.snapshot().await;
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);

    let failed = engine.get(&jobs[1].id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.unwrap().contains("boom"));
    assert!(failed.result.is_none());
}

#[tokio::test]
async fn timed_out_remote_call_fails_the_job() {
    let client = Arc::new(MockActionClient::new());
    client.script_reply(Err(CoreError::Timeout(60)));
    let engine = test_engine(Arc::clone(&client), fast_config());

    let job = engine
        .submit(JobPayload::Reply(reply("42")), SubmitOptions::default())
        .await
        .unwrap();
    engine.tick().await;
    wait_until(Duration::from_secs(2), || async {
        engine.get(&job.id).await.unwrap().status.is_terminal()
    })
    .await;

    // A hang is a terminal failure like any other remote error; no retry.
    let done = engine.get(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.unwrap().contains("timed out after 60 seconds"));
    assert!(done.completed_at.is_some());
    assert!(done.result.is_none());
}

#[tokio::test]
async fn completed_reply_schedules_the_follow_up_dm() {
    let client = Arc::new(MockActionClient::new());
    let engine = test_engine(Arc::clone(&client), fast_config());

    let job = engine
        .submit(
            JobPayload::Reply(reply("42")),
            SubmitOptions {
                follow_up_dm: Some(DmPayload {
                    recipient: "someone".to_string(),
                    message: "thanks for the raid".to_string(),
                    account: "acct1".to_string(),
                }),
                dm_delay_secs: Some((0, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    engine.tick().await;
    wait_until(Duration::from_secs(2), || async {
        let (jobs, _) = engine.snapshot().await;
        jobs.len() == 2
    })
    .await;

    engine.tick().await;
    wait_until(Duration::from_secs(2), || async {
        client.dm_calls.load(Ordering::SeqCst) == 1
    })
    .await;

    let (jobs, _) = engine.snapshot().await;
    let dm = jobs.iter().find(|j| j.payload.kind() == "dm").unwrap();
    assert_ne!(dm.id, job.id);
    assert_eq!(dm.status, JobStatus::Completed);
}

#[tokio::test]
async fn in_flight_cap_limits_concurrent_dispatch() {
    let client =
        Arc::new(MockActionClient::new().with_reply_latency(Duration::from_millis(300)));
    let engine = test_engine(
        Arc::clone(&client),
        EngineConfig {
            max_in_flight: 1,
            ..fast_config()
        },
    );

    for id in ["1", "2", "3"] {
        engine
            .submit(JobPayload::Reply(reply(id)), SubmitOptions::default())
            .await
            .unwrap();
    }

    engine.tick().await;
    engine.tick().await;
    let (_, summary) = engine.snapshot().await;
    assert_eq!(summary.running, 1);
    assert_eq!(summary.pending, 2);

    // Draining ticks finish the backlog one at a time.
    wait_until(Duration::from_secs(5), || async {
        engine.tick().await;
        let (_, summary) = engine.snapshot().await;
        summary.completed == 3
    })
    .await;
    assert_eq!(client.reply_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn submissions_are_validated_up_front() {
    let engine = test_engine(Arc::new(MockActionClient::new()), fast_config());

    let mut empty = reply("1");
    empty.text = "  ".to_string();
    let err = engine
        .submit(JobPayload::Reply(empty), SubmitOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let mut unknown = reply("1");
    unknown.account = "nobody".to_string();
    let err = engine
        .submit(JobPayload::Reply(unknown), SubmitOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let (_, summary) = engine.snapshot().await;
    assert_eq!(summary.total, 0);
}
