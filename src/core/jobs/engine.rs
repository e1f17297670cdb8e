use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::{JobStore, JobSummary};
use super::{
    Job, JobPayload, JobProgress, JobResult, JobStatus, ReplyPayload, SubmitOptions,
    can_transition,
};
use crate::core::accounts::AccountStore;
use crate::core::delay::DelayGenerator;
use crate::core::error::{CoreError, CoreResult};
use crate::core::events::{BusEvent, EventBus};
use crate::core::remote::RemoteActionClient;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Dispatch loop tick.
    pub tick_interval: Duration,
    /// Bound on simultaneously in-flight remote calls.
    pub max_in_flight: usize,
    /// Delay range for the follow-up DM after a completed reply, seconds.
    pub dm_delay_secs: (u64, u64),
    /// Delay range for the best-effort like after a completed reply, seconds.
    pub like_delay_secs: (u64, u64),
    /// Auto-like is off by default; upstream marks it unreliable. When on it
    /// is best effort and never affects the parent reply job.
    pub enable_auto_like: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_in_flight: 3,
            dm_delay_secs: (30, 90),
            like_delay_secs: (5, 10),
            enable_auto_like: false,
        }
    }
}

/// One item of a bulk "raid" submission.
pub struct BulkItem {
    pub payload: ReplyPayload,
    pub options: SubmitOptions,
}

/// The job scheduler/executor. Accepts submissions, assigns execution times,
/// advances job state, invokes the remote client, and records outcomes.
///
/// The dispatch loop is the single writer of job state; remote calls run as
/// spawned tasks bounded by `max_in_flight`. Failures are terminal and never
/// auto-retried.
pub struct JobEngine {
    store: Mutex<JobStore>,
    accounts: Arc<AccountStore>,
    client: Arc<dyn RemoteActionClient>,
    delays: Arc<DelayGenerator>,
    events: EventBus,
    cfg: EngineConfig,
    in_flight: AtomicUsize,
}

impl JobEngine {
    pub fn new(
        accounts: Arc<AccountStore>,
        client: Arc<dyn RemoteActionClient>,
        delays: Arc<DelayGenerator>,
        events: EventBus,
        cfg: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(JobStore::new()),
            accounts,
            client,
            delays,
            events,
            cfg,
            in_flight: AtomicUsize::new(0),
        })
    }

    fn validate(&self, payload: &JobPayload) -> CoreResult<()> {
        payload.validate()?;
        if self.accounts.get(payload.account()).is_none() {
            return Err(CoreError::Validation(format!(
                "unknown account '{}'",
                payload.account()
            )));
        }
        Ok(())
    }

    /// Create a job in `pending` (runs on the next tick) or `scheduled`
    /// (runs at `options.run_at`).
    pub async fn submit(&self, payload: JobPayload, options: SubmitOptions) -> CoreResult<Job> {
        self.validate(&payload)?;
        let job = Job::new(payload, options, Utc::now());
        let mut store = self.store.lock().await;
        store.insert(job.clone());
        drop(store);
        self.events.publish(BusEvent::JobCreated { job: job.clone() });
        Ok(job)
    }

    /// Create one `bulk_reply` job per item, each scheduled at a cumulative
    /// humanized offset within `delay_secs`. A batch submitted while another
    /// is still sending begins only after the earlier batch's last send.
    pub async fn submit_bulk(
        &self,
        items: Vec<BulkItem>,
        delay_secs: (u64, u64),
    ) -> CoreResult<Vec<Job>> {
        if items.is_empty() {
            return Err(CoreError::Validation("bulk submission is empty".to_string()));
        }
        for item in &items {
            self.validate(&JobPayload::BulkReply(item.payload.clone()))?;
        }

        let batch_id = uuid::Uuid::new_v4().to_string();
        let total = items.len();
        let now = Utc::now();
        let mut store = self.store.lock().await;
        let mut cursor = store.bulk_tail().map_or(now, |tail| tail.max(now));

        let mut created = Vec::with_capacity(total);
        for (k, item) in items.into_iter().enumerate() {
            let spacing = self.delays.delay_secs(delay_secs.0, delay_secs.1);
            cursor += ChronoDuration::seconds(spacing as i64);

            let mut job = Job::new(JobPayload::BulkReply(item.payload), item.options, now);
            job.status = JobStatus::Scheduled;
            job.scheduled_at = Some(cursor);
            job.batch_id = Some(batch_id.clone());
            job.progress = Some(JobProgress {
                current: k + 1,
                total,
                message: format!("queued {} of {}", k + 1, total),
            });
            store.insert(job.clone());
            created.push(job);
        }
        drop(store);

        for job in &created {
            self.events.publish(BusEvent::JobCreated { job: job.clone() });
        }
        debug!(batch = %batch_id, count = total, "queued raid batch");
        Ok(created)
    }

    /// Cancel a pending or scheduled job. Running jobs are not abortable:
    /// the in-flight remote call cannot be withdrawn once dispatched.
    pub async fn cancel(&self, id: &str) -> CoreResult<Job> {
        let mut store = self.store.lock().await;
        let job = store
            .get_mut(id)
            .ok_or_else(|| CoreError::NotFound(format!("job {}", id)))?;
        if !job.status.is_cancellable() {
            return Err(CoreError::NotCancellable(id.to_string()));
        }
        job.status = JobStatus::Cancelled;
        let cancelled = job.clone();
        drop(store);
        self.events.publish(BusEvent::JobCancelled {
            job: cancelled.clone(),
        });
        Ok(cancelled)
    }

    /// Cancel every cancellable job under one store lock, so the executor's
    /// scan never observes a half-cancelled set.
    pub async fn cancel_all(&self) -> usize {
        let mut cancelled = Vec::new();
        {
            let mut store = self.store.lock().await;
            for id in store.cancellable_ids() {
                if let Some(job) = store.get_mut(&id) {
                    job.status = JobStatus::Cancelled;
                    cancelled.push(job.clone());
                }
            }
        }
        for job in &cancelled {
            self.events.publish(BusEvent::JobCancelled { job: job.clone() });
        }
        cancelled.len()
    }

    pub async fn snapshot(&self) -> (Vec<Job>, JobSummary) {
        let store = self.store.lock().await;
        (store.jobs().to_vec(), store.summary())
    }

    pub async fn get(&self, id: &str) -> Option<Job> {
        self.store.lock().await.get(id).cloned()
    }

    pub fn spawn_dispatch_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.cfg.tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                engine.tick().await;
            }
        })
    }

    /// One dispatch pass: promote due jobs to `running` up to the in-flight
    /// cap and fire their remote calls as supervised tasks.
    pub async fn tick(self: &Arc<Self>) {
        let now = Utc::now();
        let mut started = Vec::new();
        {
            let mut store = self.store.lock().await;
            let slots = self
                .cfg
                .max_in_flight
                .saturating_sub(self.in_flight.load(Ordering::SeqCst));
            for id in store.due_ids(now, slots) {
                if let Some(job) = store.get_mut(&id) {
                    debug_assert!(can_transition(job.status, JobStatus::Running));
                    job.status = JobStatus::Running;
                    job.started_at = Some(now);
                    if job.scheduled_at.is_none() {
                        job.scheduled_at = Some(now);
                    }
                    self.in_flight.fetch_add(1, Ordering::SeqCst);
                    started.push(job.clone());
                }
            }
        }
        for job in started {
            self.events.publish(BusEvent::JobStarted { job: job.clone() });
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                engine.execute(job).await;
            });
        }
    }

    async fn execute(self: Arc<Self>, job: Job) {
        let outcome = self.perform(&job).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let now = Utc::now();
        let finished = {
            let mut store = self.store.lock().await;
            let Some(rec) = store.get_mut(&job.id) else {
                return;
            };
            rec.completed_at = Some(now);
            match outcome {
                Ok(result) => {
                    rec.status = JobStatus::Completed;
                    rec.result = Some(result);
                }
                Err(e) => {
                    rec.status = JobStatus::Failed;
                    rec.error = Some(e.to_string());
                }
            }
            rec.clone()
        };

        match finished.status {
            JobStatus::Completed => {
                self.events.publish(BusEvent::JobCompleted {
                    job: finished.clone(),
                });
                self.reply_side_actions(&finished).await;
            }
            _ => {
                warn!(
                    job = %finished.id,
                    kind = finished.payload.kind(),
                    error = finished.error.as_deref().unwrap_or("unknown"),
                    "job failed"
                );
                self.events.publish(BusEvent::JobFailed { job: finished });
            }
        }
    }

    async fn perform(&self, job: &Job) -> CoreResult<JobResult> {
        let account = self.accounts.get(job.payload.account()).ok_or_else(|| {
            CoreError::RemoteCall(format!(
                "account '{}' is no longer configured",
                job.payload.account()
            ))
        })?;

        match &job.payload {
            JobPayload::Reply(p) | JobPayload::BulkReply(p) => {
                let outcome = self
                    .client
                    .post_reply(
                        &p.tweet_id,
                        &p.text,
                        &account.name,
                        &account.cookie,
                        p.media.as_deref(),
                    )
                    .await?;
                Ok(JobResult::Reply {
                    reply_id: outcome.reply_id,
                    reply_url: outcome.reply_url,
                })
            }
            JobPayload::Dm(p) => {
                self.client
                    .send_dm(&p.recipient, &p.message, &account.name, &account.cookie)
                    .await?;
                Ok(JobResult::Dm)
            }
            JobPayload::Search(p) => {
                let tweets = self
                    .client
                    .search(&p.terms, &account.name, &account.cookie, p.max_results)
                    .await?;
                Ok(JobResult::Search { tweets })
            }
        }
    }

    /// Follow-ups after a completed reply: the optional DM job and the
    /// config-gated best-effort like.
    async fn reply_side_actions(self: &Arc<Self>, job: &Job) {
        let (JobPayload::Reply(reply) | JobPayload::BulkReply(reply)) = &job.payload else {
            return;
        };

        if let Some(dm) = job.options.follow_up_dm.clone() {
            let (lo, hi) = job.options.dm_delay_secs.unwrap_or(self.cfg.dm_delay_secs);
            let run_at = Utc::now() + ChronoDuration::seconds(self.delays.delay_secs(lo, hi) as i64);
            let result = self
                .submit(
                    JobPayload::Dm(dm),
                    SubmitOptions {
                        run_at: Some(run_at),
                        ..Default::default()
                    },
                )
                .await;
            if let Err(e) = result {
                warn!(job = %job.id, "follow-up DM rejected: {}", e);
            }
        }

        if self.cfg.enable_auto_like {
            let tweet_id = reply.tweet_id.clone();
            let account_name = job.payload.account().to_string();
            let wait = self
                .delays
                .delay_secs(self.cfg.like_delay_secs.0, self.cfg.like_delay_secs.1);
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(wait)).await;
                let Some(account) = engine.accounts.get(&account_name) else {
                    return;
                };
                if let Err(e) = engine
                    .client
                    .like_tweet(&tweet_id, &account.name, &account.cookie)
                    .await
                {
                    debug!(tweet = %tweet_id, "best-effort like failed: {}", e);
                }
            });
        }
    }
}
