use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::core::autorun::AutoRunSnapshot;
use crate::core::calendar::ScheduledRun;
use crate::core::jobs::Job;
use crate::core::jobs::store::JobSummary;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Typed state-change events drained by the SSE broadcaster. Scheduling logic
/// publishes these; the transport layer never reaches into the core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    JobCreated { job: Job },
    JobStarted { job: Job },
    JobCompleted { job: Job },
    JobFailed { job: Job },
    JobCancelled { job: Job },
    JobsSnapshot { jobs: Vec<Job>, summary: JobSummary },
    AutoRunState { state: AutoRunSnapshot },
    SchedulerState { entries: Vec<ScheduledRun> },
    Heartbeat { at: DateTime<Utc> },
}

impl BusEvent {
    /// SSE event name for the `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            BusEvent::JobCreated { .. } => "job_created",
            BusEvent::JobStarted { .. } => "job_started",
            BusEvent::JobCompleted { .. } => "job_completed",
            BusEvent::JobFailed { .. } => "job_failed",
            BusEvent::JobCancelled { .. } => "job_cancelled",
            BusEvent::JobsSnapshot { .. } => "jobs_snapshot",
            BusEvent::AutoRunState { .. } => "autorun_state",
            BusEvent::SchedulerState { .. } => "scheduler_state",
            BusEvent::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Fan-out bus for all connected dashboard clients. Lagging receivers are
/// dropped by the broadcast channel; clients recover via the snapshot sent
/// on reconnect.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: BusEvent) {
        // Send only fails when no client is connected.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic heartbeat so clients and proxies can detect dead connections.
pub fn spawn_heartbeat(bus: EventBus, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            bus.publish(BusEvent::Heartbeat { at: Utc::now() });
        }
    })
}
