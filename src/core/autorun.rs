use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::accounts::AccountStore;
use crate::core::delay::DelayGenerator;
use crate::core::error::{CoreError, CoreResult};
use crate::core::events::{BusEvent, EventBus};
use crate::core::jobs::engine::{BulkItem, JobEngine};
use crate::core::jobs::{DmPayload, JobStatus, ReplyPayload, SubmitOptions};
use crate::core::remote::{RemoteActionClient, TweetRef};
use crate::core::textgen::ReplyGenerator;

pub const RECENT_ERROR_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoRunStatus {
    Idle,
    Searching,
    GeneratingReplies,
    SendingReplies,
    #[serde(rename = "sending_raid_replies_1")]
    SendingRaidReplies1,
    #[serde(rename = "sending_raid_replies_2")]
    SendingRaidReplies2,
    Completed,
    Paused,
    Cancelled,
    Failed,
}

impl AutoRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AutoRunStatus::Idle => "idle",
            AutoRunStatus::Searching => "searching",
            AutoRunStatus::GeneratingReplies => "generating_replies",
            AutoRunStatus::SendingReplies => "sending_replies",
            AutoRunStatus::SendingRaidReplies1 => "sending_raid_replies_1",
            AutoRunStatus::SendingRaidReplies2 => "sending_raid_replies_2",
            AutoRunStatus::Completed => "completed",
            AutoRunStatus::Paused => "paused",
            AutoRunStatus::Cancelled => "cancelled",
            AutoRunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AutoRunStatus::Completed | AutoRunStatus::Cancelled | AutoRunStatus::Failed
        )
    }

    /// States from which a fresh run may start.
    pub fn is_idle_or_terminal(self) -> bool {
        self == AutoRunStatus::Idle || self.is_terminal()
    }

    /// Pausing is only meaningful while the run makes forward progress
    /// through generation or sending.
    pub fn can_pause(self) -> bool {
        matches!(
            self,
            AutoRunStatus::GeneratingReplies
                | AutoRunStatus::SendingReplies
                | AutoRunStatus::SendingRaidReplies1
                | AutoRunStatus::SendingRaidReplies2
        )
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AutoRunProgress {
    pub tweets_found: usize,
    pub replies_generated: usize,
    pub replies_sent: usize,
    pub replies_failed: usize,
    pub raid_replies_sent: usize,
    pub raid_replies_failed: usize,
    pub total_to_process: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoRunSnapshot {
    pub status: AutoRunStatus,
    pub progress: AutoRunProgress,
    pub current_step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recent_errors: Vec<String>,
    pub primary_job_ids: Vec<String>,
    pub raid_job_ids: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AutoRunConfig {
    pub max_tweets: usize,
    /// Humanized spacing between primary reply sends, seconds.
    pub reply_spacing_secs: (u64, u64),
    /// Humanized spacing between raid sends, seconds.
    pub raid_spacing_secs: (u64, u64),
    /// Number of raid rounds drawn per run, inclusive.
    pub raid_rounds: (usize, usize),
    pub pinned_cashtags: Vec<String>,
    pub trending_cashtags: Vec<String>,
    /// How many trending cashtags are sampled alongside the pinned set.
    pub cashtag_sample: usize,
    pub raid_targets: Vec<String>,
    pub raid_targets_per_round: usize,
    pub system_prompt: String,
    pub dm_message: String,
    /// Poll interval while observing submitted jobs.
    pub observe_interval: Duration,
}

impl Default for AutoRunConfig {
    fn default() -> Self {
        Self {
            max_tweets: 10,
            reply_spacing_secs: (47, 88),
            raid_spacing_secs: (47, 88),
            raid_rounds: (2, 4),
            pinned_cashtags: Vec::new(),
            trending_cashtags: Vec::new(),
            cashtag_sample: 2,
            raid_targets: Vec::new(),
            raid_targets_per_round: 3,
            system_prompt: "Write a short, casual reply.".to_string(),
            dm_message: "Appreciate the engagement, check your mentions.".to_string(),
            observe_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartOptions {
    #[serde(default)]
    pub max_tweets: Option<usize>,
    #[serde(default)]
    pub send_dm: bool,
}

struct Inner {
    status: AutoRunStatus,
    progress: AutoRunProgress,
    current_step: String,
    error: Option<String>,
    recent_errors: VecDeque<String>,
    primary_job_ids: Vec<String>,
    raid_job_ids: Vec<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    resume_to: Option<AutoRunStatus>,
}

impl Inner {
    fn idle() -> Self {
        Self {
            status: AutoRunStatus::Idle,
            progress: AutoRunProgress::default(),
            current_step: "idle".to_string(),
            error: None,
            recent_errors: VecDeque::new(),
            primary_job_ids: Vec::new(),
            raid_job_ids: Vec::new(),
            started_at: None,
            finished_at: None,
            resume_to: None,
        }
    }

    fn snapshot(&self) -> AutoRunSnapshot {
        AutoRunSnapshot {
            status: self.status,
            progress: self.progress,
            current_step: self.current_step.clone(),
            error: self.error.clone(),
            recent_errors: self.recent_errors.iter().cloned().collect(),
            primary_job_ids: self.primary_job_ids.clone(),
            raid_job_ids: self.raid_job_ids.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn push_error(&mut self, message: String) {
        self.recent_errors.push_back(message);
        while self.recent_errors.len() > RECENT_ERROR_LIMIT {
            self.recent_errors.pop_front();
        }
    }
}

enum StepFlow {
    Continue,
    Halt,
}

/// The supervised search → generate → send → raid workflow. One live run at
/// a time; terminal state persists until an explicit reset.
pub struct AutoRun {
    inner: Mutex<Inner>,
    engine: Arc<JobEngine>,
    accounts: Arc<AccountStore>,
    client: Arc<dyn RemoteActionClient>,
    generator: Arc<dyn ReplyGenerator>,
    delays: Arc<DelayGenerator>,
    events: EventBus,
    cfg: AutoRunConfig,
}

impl AutoRun {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<JobEngine>,
        accounts: Arc<AccountStore>,
        client: Arc<dyn RemoteActionClient>,
        generator: Arc<dyn ReplyGenerator>,
        delays: Arc<DelayGenerator>,
        events: EventBus,
        cfg: AutoRunConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::idle()),
            engine,
            accounts,
            client,
            generator,
            delays,
            events,
            cfg,
        })
    }

    pub async fn snapshot(&self) -> AutoRunSnapshot {
        self.inner.lock().await.snapshot()
    }

    async fn publish_state(&self) {
        let snapshot = self.inner.lock().await.snapshot();
        self.events.publish(BusEvent::AutoRunState { state: snapshot });
    }

    /// Begin a new run. Rejected while a previous run is neither idle nor
    /// terminal.
    pub async fn start(self: &Arc<Self>, opts: StartOptions) -> CoreResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if !inner.status.is_idle_or_terminal() {
                return Err(CoreError::StateConflict(format!(
                    "an auto-run is already active ({})",
                    inner.status.as_str()
                )));
            }
            *inner = Inner::idle();
            inner.status = AutoRunStatus::Searching;
            inner.started_at = Some(Utc::now());
            inner.current_step = "selecting account".to_string();
        }
        self.publish_state().await;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run(opts).await;
        });
        Ok(())
    }

    pub async fn pause(&self) -> CoreResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if !inner.status.can_pause() {
                return Err(CoreError::StateConflict(format!(
                    "cannot pause from {}",
                    inner.status.as_str()
                )));
            }
            inner.resume_to = Some(inner.status);
            inner.status = AutoRunStatus::Paused;
        }
        self.publish_state().await;
        Ok(())
    }

    pub async fn resume(&self) -> CoreResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.status != AutoRunStatus::Paused {
                return Err(CoreError::StateConflict(format!(
                    "cannot resume from {}",
                    inner.status.as_str()
                )));
            }
            let target = inner.resume_to.take().unwrap_or(AutoRunStatus::Idle);
            inner.status = target;
        }
        self.publish_state().await;
        Ok(())
    }

    /// Cancel the live run and withdraw its not-yet-dispatched jobs.
    pub async fn cancel(&self) -> CoreResult<()> {
        let tracked = {
            let mut inner = self.inner.lock().await;
            if inner.status.is_terminal() {
                return Err(CoreError::StateConflict(format!(
                    "run already finished ({})",
                    inner.status.as_str()
                )));
            }
            inner.status = AutoRunStatus::Cancelled;
            inner.finished_at = Some(Utc::now());
            inner.current_step = "cancelled".to_string();
            let mut ids = inner.primary_job_ids.clone();
            ids.extend(inner.raid_job_ids.iter().cloned());
            ids
        };
        for id in tracked {
            // Running jobs are not abortable; ignore those rejections.
            let _ = self.engine.cancel(&id).await;
        }
        self.publish_state().await;
        Ok(())
    }

    pub async fn reset(&self) -> CoreResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if !inner.status.is_idle_or_terminal() {
                return Err(CoreError::StateConflict(format!(
                    "cannot reset while {}",
                    inner.status.as_str()
                )));
            }
            *inner = Inner::idle();
        }
        self.publish_state().await;
        Ok(())
    }

    async fn run(self: Arc<Self>, opts: StartOptions) {
        if let Some(message) = self.run_steps(opts).await {
            self.fail(message).await;
        }
    }

    /// Returns `Some(message)` on an unrecoverable failure, `None` otherwise
    /// (including external cancellation).
    async fn run_steps(self: &Arc<Self>, opts: StartOptions) -> Option<String> {
        let Some(account) = self.accounts.pick_random(&self.delays) else {
            return Some("no accounts are available for automated runs".to_string());
        };
        let account = account.clone();
        info!(account = %account.name, "auto-run starting");

        // Search step.
        let max_tweets = opts.max_tweets.unwrap_or(self.cfg.max_tweets);
        let mut terms = self.cfg.pinned_cashtags.clone();
        terms.extend(
            self.delays
                .sample(&self.cfg.trending_cashtags, self.cfg.cashtag_sample),
        );
        self.set_step("searching for candidate tweets").await;

        let tweets = match self
            .client
            .search(&terms, &account.name, &account.cookie, max_tweets)
            .await
        {
            Ok(tweets) => tweets,
            Err(e) => return Some(format!("search failed: {}", e)),
        };
        {
            let mut inner = self.inner.lock().await;
            inner.progress.tweets_found = tweets.len();
            inner.progress.total_to_process = tweets.len();
        }
        self.publish_state().await;

        // Generation step.
        if !self.enter(AutoRunStatus::GeneratingReplies, "generating replies").await {
            return None;
        }
        let mut items = Vec::new();
        for tweet in &tweets {
            if let StepFlow::Halt = self.checkpoint().await {
                return None;
            }
            match self
                .generator
                .generate(&tweet.text, &self.cfg.system_prompt)
                .await
            {
                Ok(text) => {
                    items.push(self.bulk_item(tweet, text, &account.name, opts.send_dm));
                    let mut inner = self.inner.lock().await;
                    inner.progress.replies_generated += 1;
                }
                Err(e) => {
                    let mut inner = self.inner.lock().await;
                    inner.progress.replies_failed += 1;
                    inner.push_error(format!("generation for {} failed: {}", tweet.id, e));
                }
            }
            self.publish_state().await;
        }

        // Primary send step.
        if !self.enter(AutoRunStatus::SendingReplies, "sending replies").await {
            return None;
        }
        if !items.is_empty() {
            let jobs = match self
                .engine
                .submit_bulk(items, self.cfg.reply_spacing_secs)
                .await
            {
                Ok(jobs) => jobs,
                Err(e) => return Some(format!("submitting replies failed: {}", e)),
            };
            let ids: Vec<String> = jobs.iter().map(|j| j.id.clone()).collect();
            self.inner.lock().await.primary_job_ids = ids.clone();
            self.publish_state().await;
            if let StepFlow::Halt = self.observe(ids, false).await {
                return None;
            }
        }

        // Raid rounds.
        let rounds = self
            .delays
            .roll(self.cfg.raid_rounds.0, self.cfg.raid_rounds.1);
        for round in 1..=rounds {
            if self.cfg.raid_targets.is_empty() {
                break;
            }
            let status = if round == 1 {
                AutoRunStatus::SendingRaidReplies1
            } else {
                AutoRunStatus::SendingRaidReplies2
            };
            if !self
                .enter(status, &format!("raid round {} of {}", round, rounds))
                .await
            {
                return None;
            }

            let targets = self
                .delays
                .sample(&self.cfg.raid_targets, self.cfg.raid_targets_per_round);
            let mut raid_items = Vec::new();
            for url in &targets {
                if let StepFlow::Halt = self.checkpoint().await {
                    return None;
                }
                match self.generator.generate(url, &self.cfg.system_prompt).await {
                    Ok(text) => raid_items.push(BulkItem {
                        payload: ReplyPayload {
                            tweet_id: tweet_id_from_url(url),
                            text,
                            account: account.name.clone(),
                            media: None,
                            tweet_url: Some(url.clone()),
                        },
                        options: SubmitOptions::default(),
                    }),
                    Err(e) => {
                        let mut inner = self.inner.lock().await;
                        inner.progress.raid_replies_failed += 1;
                        inner.push_error(format!("raid generation for {} failed: {}", url, e));
                    }
                }
            }
            if raid_items.is_empty() {
                continue;
            }
            let jobs = match self
                .engine
                .submit_bulk(raid_items, self.cfg.raid_spacing_secs)
                .await
            {
                Ok(jobs) => jobs,
                Err(e) => {
                    self.inner
                        .lock()
                        .await
                        .push_error(format!("raid round {} rejected: {}", round, e));
                    continue;
                }
            };
            let ids: Vec<String> = jobs.iter().map(|j| j.id.clone()).collect();
            self.inner
                .lock()
                .await
                .raid_job_ids
                .extend(ids.iter().cloned());
            self.publish_state().await;
            if let StepFlow::Halt = self.observe(ids, true).await {
                return None;
            }
        }

        // Done.
        {
            let mut inner = self.inner.lock().await;
            if inner.status.is_terminal() {
                return None;
            }
            inner.status = AutoRunStatus::Completed;
            inner.finished_at = Some(Utc::now());
            inner.current_step = "auto-run complete".to_string();
        }
        self.publish_state().await;
        info!("auto-run complete");
        None
    }

    fn bulk_item(&self, tweet: &TweetRef, text: String, account: &str, send_dm: bool) -> BulkItem {
        let follow_up_dm = send_dm.then(|| DmPayload {
            recipient: tweet.author.clone(),
            message: self.cfg.dm_message.clone(),
            account: account.to_string(),
        });
        BulkItem {
            payload: ReplyPayload {
                tweet_id: tweet.id.clone(),
                text,
                account: account.to_string(),
                media: None,
                tweet_url: Some(tweet.url.clone()),
            },
            options: SubmitOptions {
                run_at: None,
                follow_up_dm,
                dm_delay_secs: None,
            },
        }
    }

    /// Move to the next workflow state unless the run was cancelled or failed
    /// underneath us. Waits out a pause first.
    async fn enter(&self, status: AutoRunStatus, step: &str) -> bool {
        if let StepFlow::Halt = self.checkpoint().await {
            return false;
        }
        {
            let mut inner = self.inner.lock().await;
            if inner.status.is_terminal() {
                return false;
            }
            inner.status = status;
            inner.current_step = step.to_string();
        }
        self.publish_state().await;
        true
    }

    async fn set_step(&self, step: &str) {
        self.inner.lock().await.current_step = step.to_string();
        self.publish_state().await;
    }

    /// Cooperative control point: blocks while paused, halts when the run
    /// has been cancelled or failed externally.
    async fn checkpoint(&self) -> StepFlow {
        loop {
            let status = self.inner.lock().await.status;
            match status {
                AutoRunStatus::Cancelled | AutoRunStatus::Failed => return StepFlow::Halt,
                AutoRunStatus::Paused => tokio::time::sleep(Duration::from_millis(200)).await,
                _ => return StepFlow::Continue,
            }
        }
    }

    /// Watch submitted jobs until every one reaches a terminal state,
    /// tallying sent/failed counters. A pause does not interrupt observation;
    /// in-flight and already-queued sends proceed.
    async fn observe(&self, ids: Vec<String>, raid: bool) -> StepFlow {
        let mut remaining: HashSet<String> = ids.into_iter().collect();
        while !remaining.is_empty() {
            {
                let status = self.inner.lock().await.status;
                if matches!(status, AutoRunStatus::Cancelled | AutoRunStatus::Failed) {
                    return StepFlow::Halt;
                }
            }
            tokio::time::sleep(self.cfg.observe_interval).await;

            let mut changed = false;
            for id in remaining.clone() {
                let Some(job) = self.engine.get(&id).await else {
                    remaining.remove(&id);
                    continue;
                };
                if !job.status.is_terminal() {
                    continue;
                }
                remaining.remove(&id);
                changed = true;
                let mut inner = self.inner.lock().await;
                match job.status {
                    JobStatus::Completed if raid => inner.progress.raid_replies_sent += 1,
                    JobStatus::Completed => inner.progress.replies_sent += 1,
                    JobStatus::Failed => {
                        if raid {
                            inner.progress.raid_replies_failed += 1;
                        } else {
                            inner.progress.replies_failed += 1;
                        }
                        let detail = job.error.clone().unwrap_or_else(|| "unknown".to_string());
                        inner.push_error(format!("reply {} failed: {}", job.id, detail));
                    }
                    _ => {}
                }
            }
            if changed {
                self.publish_state().await;
            }
        }
        StepFlow::Continue
    }

    async fn fail(&self, message: String) {
        {
            let mut inner = self.inner.lock().await;
            if inner.status.is_terminal() {
                return;
            }
            warn!("auto-run failed: {}", message);
            inner.push_error(message.clone());
            inner.error = Some(message);
            inner.status = AutoRunStatus::Failed;
            inner.finished_at = Some(Utc::now());
            inner.current_step = "failed".to_string();
        }
        self.publish_state().await;
    }
}

/// Best-effort tweet id from a status URL; falls back to the raw URL when the
/// path does not end in an id.
fn tweet_id_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|tail| !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()))
        .map(|tail| tail.to_string())
        .unwrap_or_else(|| url.to_string())
}
