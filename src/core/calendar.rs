use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::autorun::{AutoRun, StartOptions};
use crate::core::delay::DelayGenerator;
use crate::core::error::{CoreError, CoreResult};
use crate::core::events::{BusEvent, EventBus};

/// A recurring daily trigger for the auto-run. `random_offset_minutes` holds
/// the currently rolled jitter; it is re-rolled every time the entry re-arms.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledRun {
    pub id: String,
    pub time_of_day: NaiveTime,
    pub enabled: bool,
    pub random_offset_minutes: i64,
    pub next_run_time: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Jitter range the per-occurrence offset is drawn from, minutes.
    pub jitter_minutes: (i64, i64),
    /// Scan interval for due entries.
    pub tick_interval: Duration,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            jitter_minutes: (2, 15),
            tick_interval: Duration::from_secs(60),
        }
    }
}

/// Parse a "HH:MM" (or "HH:MM:SS") time-of-day string.
pub fn parse_time_of_day(s: &str) -> CoreResult<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
        .map_err(|_| CoreError::Validation(format!("'{}' is not a valid HH:MM time", s)))
}

/// Next occurrence of `time_of_day + offset` strictly after `after`,
/// in naive local time.
pub(crate) fn next_occurrence_naive(
    after: NaiveDateTime,
    time_of_day: NaiveTime,
    offset_minutes: i64,
) -> NaiveDateTime {
    let mut candidate =
        after.date().and_time(time_of_day) + ChronoDuration::minutes(offset_minutes);
    if candidate <= after {
        candidate += ChronoDuration::days(1);
    }
    candidate
}

/// Target for an entry that just fired at `fired_at`: the next day's
/// `time_of_day + offset`, regardless of where the new offset lands relative
/// to the fire time. Firing twice on the same local day is never allowed.
pub(crate) fn next_day_occurrence_naive(
    fired_at: NaiveDateTime,
    time_of_day: NaiveTime,
    offset_minutes: i64,
) -> NaiveDateTime {
    (fired_at.date() + ChronoDuration::days(1)).and_time(time_of_day)
        + ChronoDuration::minutes(offset_minutes)
}

fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // DST gap: nudge forward an hour.
        chrono::LocalResult::None => {
            let shifted = naive + ChronoDuration::hours(1);
            match Local.from_local_datetime(&shifted).earliest() {
                Some(dt) => dt.with_timezone(&Utc),
                None => Utc.from_utc_datetime(&shifted),
            }
        }
    }
}

/// Maintains the daily trigger entries and fires the auto-run when one comes
/// due. A due entry skipped because the orchestrator is busy stays due and is
/// retried on a later tick; it is never silently pushed to the next day.
pub struct CalendarScheduler {
    entries: Mutex<Vec<ScheduledRun>>,
    autorun: Arc<AutoRun>,
    delays: Arc<DelayGenerator>,
    events: EventBus,
    cfg: CalendarConfig,
}

impl CalendarScheduler {
    pub fn new(
        autorun: Arc<AutoRun>,
        delays: Arc<DelayGenerator>,
        events: EventBus,
        cfg: CalendarConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
            autorun,
            delays,
            events,
            cfg,
        })
    }

    fn roll_offset(&self) -> i64 {
        self.delays
            .offset_minutes(self.cfg.jitter_minutes.0, self.cfg.jitter_minutes.1)
    }

    pub async fn list(&self) -> Vec<ScheduledRun> {
        self.entries.lock().await.clone()
    }

    pub async fn create(&self, time_of_day: NaiveTime, enabled: bool) -> ScheduledRun {
        let offset = self.roll_offset();
        let now_local = Local::now().naive_local();
        let entry = ScheduledRun {
            id: uuid::Uuid::new_v4().to_string(),
            time_of_day,
            enabled,
            random_offset_minutes: offset,
            next_run_time: local_to_utc(next_occurrence_naive(now_local, time_of_day, offset)),
            last_run: None,
        };
        self.entries.lock().await.push(entry.clone());
        info!(
            schedule = %entry.id,
            time = %time_of_day,
            offset_minutes = offset,
            "schedule entry created"
        );
        self.publish_state().await;
        entry
    }

    pub async fn delete(&self, id: &str) -> CoreResult<()> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(CoreError::NotFound(format!("schedule {}", id)));
        }
        drop(entries);
        self.publish_state().await;
        Ok(())
    }

    /// Change an entry's time of day and/or enabled flag. An enabled entry
    /// re-arms from now with a fresh offset.
    pub async fn update(
        &self,
        id: &str,
        time_of_day: Option<NaiveTime>,
        enabled: Option<bool>,
    ) -> CoreResult<ScheduledRun> {
        let updated = {
            let mut entries = self.entries.lock().await;
            let entry = entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| CoreError::NotFound(format!("schedule {}", id)))?;
            if let Some(t) = time_of_day {
                entry.time_of_day = t;
            }
            if let Some(flag) = enabled {
                entry.enabled = flag;
            }
            if entry.enabled {
                entry.random_offset_minutes = self.roll_offset();
                entry.next_run_time = local_to_utc(next_occurrence_naive(
                    Local::now().naive_local(),
                    entry.time_of_day,
                    entry.random_offset_minutes,
                ));
            }
            entry.clone()
        };
        self.publish_state().await;
        Ok(updated)
    }

    /// Flip the enabled flag. Re-enabling re-arms from now with a fresh
    /// offset so a long-disabled entry does not fire immediately.
    pub async fn toggle(&self, id: &str) -> CoreResult<ScheduledRun> {
        let updated = {
            let mut entries = self.entries.lock().await;
            let entry = entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| CoreError::NotFound(format!("schedule {}", id)))?;
            entry.enabled = !entry.enabled;
            if entry.enabled {
                entry.random_offset_minutes = self.roll_offset();
                entry.next_run_time = local_to_utc(next_occurrence_naive(
                    Local::now().naive_local(),
                    entry.time_of_day,
                    entry.random_offset_minutes,
                ));
            }
            entry.clone()
        };
        self.publish_state().await;
        Ok(updated)
    }

    pub fn spawn_tick_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let calendar = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(calendar.cfg.tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                calendar.tick(Utc::now()).await;
            }
        })
    }

    /// Scan for due entries. Fires at most once per entry per tick.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let due_ids: Vec<String> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .filter(|e| e.enabled && e.next_run_time <= now)
                .map(|e| e.id.clone())
                .collect()
        };
        if due_ids.is_empty() {
            return;
        }

        let mut fired = false;
        for id in due_ids {
            if !self.autorun.snapshot().await.status.is_idle_or_terminal() {
                debug!(schedule = %id, "auto-run busy, entry stays due");
                continue;
            }

            info!(schedule = %id, "scheduled run firing");
            if let Err(e) = self.autorun.start(StartOptions::default()).await {
                warn!(schedule = %id, "scheduled start rejected: {}", e);
            }

            // Re-arm regardless of the start outcome.
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                entry.last_run = Some(now);
                entry.random_offset_minutes = self.roll_offset();
                entry.next_run_time = local_to_utc(next_day_occurrence_naive(
                    now.with_timezone(&Local).naive_local(),
                    entry.time_of_day,
                    entry.random_offset_minutes,
                ));
            }
            fired = true;
        }
        if fired {
            self.publish_state().await;
        }
    }

    #[cfg(test)]
    pub(crate) async fn insert_entry(&self, entry: ScheduledRun) {
        self.entries.lock().await.push(entry);
    }

    async fn publish_state(&self) {
        let entries = self.entries.lock().await.clone();
        self.events.publish(BusEvent::SchedulerState { entries });
    }
}
