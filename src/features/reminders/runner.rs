//! Named delayed-job runner
//!
//! Jobs are stored by value and keyed by name; upserting an existing name
//! replaces it. One background loop sleeps until the earliest fire time (or
//! until a mutation wakes it), then hands each fired payload to an mpsc
//! channel. The loop never waits on delivery.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Due jobs are re-checked at removal time

use super::scheduler::ReminderJob;
use crate::core::{BotError, BotResult};
use crate::features::deadlines::local_now;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use dashmap::DashMap;
use log::{debug, info};
use tokio::sync::{mpsc, Notify};

/// Upper bound on a single sleep, so wall-clock jumps are noticed
const MAX_IDLE_SECS: u64 = 60;

/// When a job fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTrigger {
    /// Once, at a local civil time
    At(NaiveDateTime),
    /// Every day at a local hour and minute
    Daily { hour: u32, minute: u32 },
}

impl JobTrigger {
    /// First fire time strictly after `now` for daily triggers, the fixed
    /// time for one-shot triggers
    pub fn first_fire(&self, now: NaiveDateTime) -> BotResult<NaiveDateTime> {
        match self {
            JobTrigger::At(at) => Ok(*at),
            JobTrigger::Daily { hour, minute } => next_daily(*hour, *minute, now),
        }
    }
}

/// Next occurrence of `hour:minute` strictly after `after`
pub fn next_daily(hour: u32, minute: u32, after: NaiveDateTime) -> BotResult<NaiveDateTime> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| BotError::Validation(format!("invalid time of day {hour}:{minute}")))?;
    let today = after.date().and_time(time);
    Ok(if today > after {
        today
    } else {
        today + Duration::days(1)
    })
}

/// What a fired job asks for
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    /// Deliver a deadline reminder
    Reminder(ReminderJob),
    /// Run a recurring check by name
    Recurring { name: String },
}

/// A job as held by the runner
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub trigger: JobTrigger,
    pub next_fire: NaiveDateTime,
    pub payload: JobPayload,
}

/// A job handed to the worker when it fires
#[derive(Debug, Clone)]
pub struct FiredJob {
    pub name: String,
    pub scheduled_for: NaiveDateTime,
    pub payload: JobPayload,
}

/// Named jobs with absolute fire times and replace-by-name semantics
pub trait JobRunner: Send + Sync {
    /// Insert or replace the job called `name`; returns its first fire time
    fn upsert(&self, name: &str, trigger: JobTrigger, payload: JobPayload)
        -> BotResult<NaiveDateTime>;

    /// Remove a pending job
    fn cancel(&self, name: &str) -> BotResult<()>;

    /// Names of all pending jobs
    fn list_names(&self) -> Vec<String>;

    /// Next fire time of a pending job
    fn next_fire(&self, name: &str) -> Option<NaiveDateTime>;
}

/// Tokio-driven [`JobRunner`]
#[derive(Default)]
pub struct TokioJobRunner {
    jobs: DashMap<String, ScheduledJob>,
    wake: Notify,
}

impl TokioJobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Start the timing loop; fired jobs are sent on `tx`
    ///
    /// The loop ends when the receiving side is dropped.
    pub fn spawn(
        self: std::sync::Arc<Self>,
        tx: mpsc::UnboundedSender<FiredJob>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("Job runner started with {} pending jobs", self.jobs.len());
            loop {
                for fired in self.take_due(local_now()) {
                    debug!("Job {} fired (scheduled {})", fired.name, fired.scheduled_for);
                    if tx.send(fired).is_err() {
                        info!("Job channel closed, stopping runner");
                        return;
                    }
                }

                let idle = std::time::Duration::from_secs(MAX_IDLE_SECS);
                let wait = self
                    .earliest()
                    .map(|at| (at - local_now()).to_std().unwrap_or_default().min(idle))
                    .unwrap_or(idle);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.wake.notified() => {}
                }
            }
        })
    }

    /// Remove due one-shot jobs, advance due daily jobs, return what fired
    pub fn take_due(&self, now: NaiveDateTime) -> Vec<FiredJob> {
        let due = self.due_names(now);
        self.fire_due(due, now)
    }

    fn due_names(&self, now: NaiveDateTime) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|job| job.next_fire <= now)
            .map(|job| job.key().clone())
            .collect()
    }

    /// Fire the named jobs that are still due
    ///
    /// A job upserted to a later time after `due_names` ran keeps its new time.
    fn fire_due(&self, names: Vec<String>, now: NaiveDateTime) -> Vec<FiredJob> {
        let mut fired = Vec::with_capacity(names.len());
        for name in names {
            if let Some((_, job)) = self.jobs.remove_if(&name, |_, job| {
                job.next_fire <= now && matches!(job.trigger, JobTrigger::At(_))
            }) {
                fired.push(FiredJob {
                    name: job.name,
                    scheduled_for: job.next_fire,
                    payload: job.payload,
                });
                continue;
            }

            if let Some(mut job) = self.jobs.get_mut(&name) {
                let JobTrigger::Daily { hour, minute } = job.trigger else {
                    continue;
                };
                if job.next_fire > now {
                    continue;
                }
                fired.push(FiredJob {
                    name: job.name.clone(),
                    scheduled_for: job.next_fire,
                    payload: job.payload.clone(),
                });
                // Missed occurrences coalesce into this one run
                if let Ok(next) = next_daily(hour, minute, now) {
                    job.next_fire = next;
                }
            }
        }
        fired.sort_by_key(|job| job.scheduled_for);
        fired
    }

    fn earliest(&self) -> Option<NaiveDateTime> {
        self.jobs.iter().map(|job| job.next_fire).min()
    }
}

impl JobRunner for TokioJobRunner {
    fn upsert(
        &self,
        name: &str,
        trigger: JobTrigger,
        payload: JobPayload,
    ) -> BotResult<NaiveDateTime> {
        let next_fire = trigger.first_fire(local_now())?;
        let replaced = self
            .jobs
            .insert(
                name.to_string(),
                ScheduledJob {
                    name: name.to_string(),
                    trigger,
                    next_fire,
                    payload,
                },
            )
            .is_some();
        if replaced {
            debug!("Replaced job {name}, next fire {next_fire}");
        }
        self.wake.notify_one();
        Ok(next_fire)
    }

    fn cancel(&self, name: &str) -> BotResult<()> {
        self.jobs
            .remove(name)
            .map(|_| self.wake.notify_one())
            .ok_or_else(|| BotError::JobNotFound(name.to_string()))
    }

    fn list_names(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.key().clone()).collect()
    }

    fn next_fire(&self, name: &str) -> Option<NaiveDateTime> {
        self.jobs.get(name).map(|job| job.next_fire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn recurring(name: &str) -> JobPayload {
        JobPayload::Recurring {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_next_daily() {
        assert_eq!(
            next_daily(8, 0, at("2030-01-01 07:59")).unwrap(),
            at("2030-01-01 08:00")
        );
        assert_eq!(
            next_daily(8, 0, at("2030-01-01 08:00")).unwrap(),
            at("2030-01-02 08:00")
        );
        assert!(next_daily(25, 0, at("2030-01-01 08:00")).is_err());
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let runner = TokioJobRunner::new();
        let far = local_now() + Duration::days(10);
        runner.upsert("job", JobTrigger::At(far), recurring("a")).unwrap();
        runner
            .upsert("job", JobTrigger::At(far + Duration::days(1)), recurring("b"))
            .unwrap();

        assert_eq!(runner.len(), 1);
        assert_eq!(runner.next_fire("job"), Some(far + Duration::days(1)));
    }

    #[test]
    fn test_cancel_unknown_job() {
        let runner = TokioJobRunner::new();
        assert!(matches!(
            runner.cancel("missing"),
            Err(BotError::JobNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_take_due_removes_one_shot_and_advances_daily() {
        let runner = TokioJobRunner::new();
        let soon = local_now() + Duration::minutes(5);
        runner.upsert("once", JobTrigger::At(soon), recurring("once")).unwrap();
        runner
            .upsert("daily", JobTrigger::Daily { hour: 0, minute: 0 }, recurring("daily"))
            .unwrap();
        runner
            .upsert("later", JobTrigger::At(soon + Duration::days(30)), recurring("later"))
            .unwrap();

        let check_at = local_now() + Duration::days(2);
        let fired = runner.take_due(check_at);
        let mut names: Vec<&str> = fired.iter().map(|f| f.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["daily", "once"]);

        assert!(runner.next_fire("once").is_none());
        assert!(runner.next_fire("daily").unwrap() > check_at);
        assert!(runner.next_fire("later").is_some());
        assert!(runner.take_due(check_at).is_empty());
    }

    #[test]
    fn test_rescheduled_job_not_fired_from_stale_scan() {
        let runner = TokioJobRunner::new();
        let soon = local_now() + Duration::minutes(5);
        runner.upsert("once", JobTrigger::At(soon), recurring("old")).unwrap();
        runner
            .upsert("daily", JobTrigger::Daily { hour: 0, minute: 0 }, recurring("daily"))
            .unwrap();

        let check_at = local_now() + Duration::days(2);
        let due = runner.due_names(check_at);
        assert_eq!(due.len(), 2);

        // Both move past the scan time before they are fired
        let later = check_at + Duration::days(10);
        runner.upsert("once", JobTrigger::At(later), recurring("new")).unwrap();
        runner.jobs.get_mut("daily").unwrap().next_fire = later;

        assert!(runner.fire_due(due, check_at).is_empty());
        assert_eq!(runner.next_fire("once"), Some(later));
        assert_eq!(runner.next_fire("daily"), Some(later));
        assert_eq!(runner.len(), 2);
    }

    #[tokio::test]
    async fn test_loop_delivers_fired_jobs_over_channel() {
        let runner = Arc::new(TokioJobRunner::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = runner.clone().spawn(tx);

        runner
            .upsert(
                "quick",
                JobTrigger::At(local_now() + Duration::milliseconds(200)),
                recurring("quick"),
            )
            .unwrap();

        let fired = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("job should fire")
            .expect("channel open");
        assert_eq!(fired.name, "quick");
        assert!(runner.is_empty());

        drop(rx);
        handle.abort();
    }
}
