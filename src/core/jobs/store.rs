use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::{Job, JobPayload, JobStatus};

/// Snapshot counts by status, pushed to the dashboard alongside the job list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub pending: usize,
    pub scheduled: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

/// In-memory record of every job for the lifetime of the process. Durability
/// across restarts is deliberately out of scope; the dashboard re-syncs from
/// the snapshot on reconnect.
///
/// Single-writer: only the engine mutates jobs after insertion.
#[derive(Default)]
pub struct JobStore {
    jobs: Vec<Job>,
    index: HashMap<String, usize>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, job: Job) {
        self.index.insert(job.id.clone(), self.jobs.len());
        self.jobs.push(job);
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.index.get(id).map(|&i| &self.jobs[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Job> {
        let i = *self.index.get(id)?;
        Some(&mut self.jobs[i])
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn summary(&self) -> JobSummary {
        let mut s = JobSummary::default();
        for job in &self.jobs {
            match job.status {
                JobStatus::Pending => s.pending += 1,
                JobStatus::Scheduled => s.scheduled += 1,
                JobStatus::Running => s.running += 1,
                JobStatus::Completed => s.completed += 1,
                JobStatus::Failed => s.failed += 1,
                JobStatus::Cancelled => s.cancelled += 1,
            }
        }
        s.total = self.jobs.len();
        s
    }

    /// Ids of jobs due to run at `now`, oldest due time first, capped at
    /// `limit` to respect the in-flight bound.
    pub fn due_ids(&self, now: DateTime<Utc>, limit: usize) -> Vec<String> {
        let mut due: Vec<&Job> = self
            .jobs
            .iter()
            .filter(|j| match j.status {
                JobStatus::Pending => true,
                JobStatus::Scheduled => j.due_at() <= now,
                _ => false,
            })
            .collect();
        due.sort_by_key(|j| j.due_at());
        due.into_iter().take(limit).map(|j| j.id.clone()).collect()
    }

    pub fn cancellable_ids(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| j.status.is_cancellable())
            .map(|j| j.id.clone())
            .collect()
    }

    /// Latest scheduled send among outstanding bulk jobs. New batches start
    /// their cumulative offsets after this point so two batches never
    /// interleave.
    pub fn bulk_tail(&self) -> Option<DateTime<Utc>> {
        self.jobs
            .iter()
            .filter(|j| {
                matches!(j.payload, JobPayload::BulkReply(_)) && !j.status.is_terminal()
            })
            .filter_map(|j| j.scheduled_at)
            .max()
    }
}
