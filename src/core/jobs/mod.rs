pub mod engine;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{CoreError, CoreResult};
use crate::core::remote::TweetRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Only jobs that have not been handed to the executor can be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Scheduled)
    }
}

/// Legal job transitions. Terminal states never resurrect; a failed job must
/// be resubmitted by a caller.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    if from == to {
        return true;
    }
    match from {
        JobStatus::Pending | JobStatus::Scheduled => {
            matches!(to, JobStatus::Running | JobStatus::Cancelled)
        }
        JobStatus::Running => matches!(to, JobStatus::Completed | JobStatus::Failed),
        JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub tweet_id: String,
    pub text: String,
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweet_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmPayload {
    pub recipient: String,
    pub message: String,
    pub account: String,
}

fn default_max_results() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPayload {
    pub terms: Vec<String>,
    pub account: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

/// Type-specific payload, decided at construction time and never mutated
/// across types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    Reply(ReplyPayload),
    Dm(DmPayload),
    Search(SearchPayload),
    BulkReply(ReplyPayload),
}

impl JobPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            JobPayload::Reply(_) => "reply",
            JobPayload::Dm(_) => "dm",
            JobPayload::Search(_) => "search",
            JobPayload::BulkReply(_) => "bulk_reply",
        }
    }

    pub fn account(&self) -> &str {
        match self {
            JobPayload::Reply(p) | JobPayload::BulkReply(p) => &p.account,
            JobPayload::Dm(p) => &p.account,
            JobPayload::Search(p) => &p.account,
        }
    }

    /// Rejects jobs with missing required fields before they are stored.
    pub fn validate(&self) -> CoreResult<()> {
        let missing = |field: &str, kind: &str| {
            Err(CoreError::Validation(format!(
                "{} job requires a non-empty {}",
                kind, field
            )))
        };
        match self {
            JobPayload::Reply(p) | JobPayload::BulkReply(p) => {
                if p.tweet_id.trim().is_empty() {
                    return missing("tweet_id", self.kind());
                }
                if p.text.trim().is_empty() {
                    return missing("text", self.kind());
                }
                if p.account.trim().is_empty() {
                    return missing("account", self.kind());
                }
            }
            JobPayload::Dm(p) => {
                if p.recipient.trim().is_empty() {
                    return missing("recipient", "dm");
                }
                if p.message.trim().is_empty() {
                    return missing("message", "dm");
                }
                if p.account.trim().is_empty() {
                    return missing("account", "dm");
                }
            }
            JobPayload::Search(p) => {
                if p.terms.iter().all(|t| t.trim().is_empty()) {
                    return missing("terms", "search");
                }
                if p.account.trim().is_empty() {
                    return missing("account", "search");
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    Reply { reply_id: String, reply_url: String },
    Dm,
    Search { tweets: Vec<TweetRef> },
}

impl JobResult {
    pub fn reply_url(&self) -> Option<&str> {
        match self {
            JobResult::Reply { reply_url, .. } => Some(reply_url),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Options attached at submission time. `run_at` defers the job; a follow-up
/// DM is submitted after the reply completes, delayed by `dm_delay_secs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitOptions {
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub follow_up_dm: Option<DmPayload>,
    #[serde(default)]
    pub dm_delay_secs: Option<(u64, u64)>,
}

/// A unit of scheduled remote work. Mutated only by the executor once stored.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    #[serde(flatten)]
    pub payload: JobPayload,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(skip)]
    pub options: SubmitOptions,
}

impl Job {
    pub fn new(payload: JobPayload, options: SubmitOptions, now: DateTime<Utc>) -> Self {
        let (status, scheduled_at) = match options.run_at {
            Some(at) if at > now => (JobStatus::Scheduled, Some(at)),
            _ => (JobStatus::Pending, None),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            status,
            created_at: now,
            scheduled_at,
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
            progress: None,
            batch_id: None,
            options,
        }
    }

    /// The instant the job becomes due. Pending jobs are due immediately.
    pub fn due_at(&self) -> DateTime<Utc> {
        self.scheduled_at.unwrap_or(self.created_at)
    }
}

#[cfg(test)]
mod tests;
