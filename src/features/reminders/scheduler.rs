//! Per-deadline reminder jobs
//!
//! Every active deadline maps to one job per reminder offset, keyed
//! `deadline_<id>_<offset>days`. Jobs carry a snapshot of the deadline, so a
//! firing reminder never reads live registry state.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use super::runner::{JobPayload, JobRunner, JobTrigger};
use crate::features::deadlines::{local_now, Deadline, Identity, REMINDER_OFFSETS_DAYS};
use chrono::{Duration, NaiveDateTime};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Job name for one reminder of one deadline
pub fn job_key(deadline_id: u64, offset_days: i64) -> String {
    format!("deadline_{deadline_id}_{offset_days}days")
}

/// Prefix shared by every reminder job of a deadline
pub fn job_prefix(deadline_id: u64) -> String {
    format!("deadline_{deadline_id}_")
}

/// Descriptor stored in the runner for one reminder
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderJob {
    /// Origin chat of the deadline
    pub destination_hint: Identity,
    pub due_at: NaiveDateTime,
    pub offset_days: i64,
    pub deadline: Deadline,
}

impl ReminderJob {
    pub fn new(deadline: &Deadline, offset_days: i64) -> Self {
        Self {
            destination_hint: deadline.created_in,
            due_at: deadline.due_at,
            offset_days,
            deadline: deadline.clone(),
        }
    }

    pub fn key(&self) -> String {
        job_key(self.deadline.id, self.offset_days)
    }

    pub fn fire_at(&self) -> NaiveDateTime {
        self.due_at - Duration::days(self.offset_days)
    }
}

/// Outcome of startup restoration
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Future deadlines that were rescheduled
    pub deadlines: usize,
    /// Jobs created
    pub jobs: usize,
    /// Reminder offsets of future deadlines whose time already passed
    pub dropped: usize,
}

/// Keeps the runner's job set in step with deadline state
pub struct ReminderScheduler {
    runner: Arc<dyn JobRunner>,
}

impl ReminderScheduler {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &Arc<dyn JobRunner> {
        &self.runner
    }

    /// Upsert one job per offset whose fire time is still ahead
    ///
    /// Returns the number of jobs scheduled.
    pub fn schedule_for(&self, deadline: &Deadline) -> usize {
        self.schedule_for_at(deadline, local_now())
    }

    pub(crate) fn schedule_for_at(&self, deadline: &Deadline, now: NaiveDateTime) -> usize {
        let mut scheduled = 0;
        for offset in REMINDER_OFFSETS_DAYS {
            let job = ReminderJob::new(deadline, offset);
            let fire_at = job.fire_at();
            if fire_at <= now {
                continue;
            }

            let key = job.key();
            match self
                .runner
                .upsert(&key, JobTrigger::At(fire_at), JobPayload::Reminder(job))
            {
                Ok(_) => {
                    scheduled += 1;
                    debug!(
                        "Scheduled reminder for deadline {} ({offset} days before) at {fire_at}",
                        deadline.id
                    );
                }
                Err(e) => error!("Failed to schedule {key}: {e}"),
            }
        }
        info!(
            "Scheduled {scheduled} reminder(s) for deadline {} due {}",
            deadline.id,
            deadline.due_display()
        );
        scheduled
    }

    /// Remove every pending reminder of a deadline, best effort
    ///
    /// Returns the number of jobs removed.
    pub fn cancel_for(&self, deadline_id: u64) -> usize {
        let prefix = job_prefix(deadline_id);
        let mut cancelled = 0;
        for name in self
            .runner
            .list_names()
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
        {
            match self.runner.cancel(&name) {
                Ok(()) => {
                    cancelled += 1;
                    debug!("Cancelled reminder {name}");
                }
                Err(e) => warn!("Failed to cancel reminder {name}: {e}"),
            }
        }
        info!("Cancelled {cancelled} reminder(s) for deadline {deadline_id}");
        cancelled
    }

    /// Reschedule every deadline still in the future
    ///
    /// Must run after the registry has loaded. Reminder offsets that elapsed
    /// while the process was down are dropped, not fired late.
    pub fn restore_all(&self, deadlines: &[Deadline]) -> RestoreSummary {
        self.restore_all_at(deadlines, local_now())
    }

    pub(crate) fn restore_all_at(&self, deadlines: &[Deadline], now: NaiveDateTime) -> RestoreSummary {
        let mut summary = RestoreSummary::default();
        for deadline in deadlines.iter().filter(|d| d.due_at > now) {
            let jobs = self.schedule_for_at(deadline, now);
            summary.deadlines += 1;
            summary.jobs += jobs;
            summary.dropped += REMINDER_OFFSETS_DAYS.len() - jobs;
        }
        info!(
            "Restored {} reminder(s) for {} active deadline(s), {} elapsed offset(s) dropped",
            summary.jobs, summary.deadlines, summary.dropped
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BotError, BotResult};
    use crate::features::reminders::runner::TokioJobRunner;
    use std::sync::Mutex;

    fn deadline(id: u64, due_at: NaiveDateTime) -> Deadline {
        Deadline {
            id,
            title: "HW1".into(),
            subject: "Math".into(),
            description: String::new(),
            due_at,
            is_private: false,
            created_by: 1,
            created_in: 77,
            author_display_name: "A".into(),
        }
    }

    fn setup() -> (Arc<TokioJobRunner>, ReminderScheduler) {
        let runner = Arc::new(TokioJobRunner::new());
        let scheduler = ReminderScheduler::new(runner.clone());
        (runner, scheduler)
    }

    fn sorted_names(runner: &TokioJobRunner) -> Vec<String> {
        let mut names = runner.list_names();
        names.sort();
        names
    }

    #[test]
    fn test_job_keys() {
        assert_eq!(job_key(12, 3), "deadline_12_3days");
        assert!(job_key(10, 0).starts_with(&job_prefix(10)));
        assert!(!job_key(10, 0).starts_with(&job_prefix(1)));
    }

    #[test]
    fn test_schedule_far_deadline_creates_all_offsets() {
        let (runner, scheduler) = setup();
        let now = local_now();
        let d = deadline(1, now + Duration::days(10));

        assert_eq!(scheduler.schedule_for_at(&d, now), 4);
        for offset in REMINDER_OFFSETS_DAYS {
            let fire = runner.next_fire(&job_key(1, offset)).unwrap();
            assert_eq!(fire, d.due_at - Duration::days(offset));
            assert!(fire > now);
        }
    }

    #[test]
    fn test_schedule_is_idempotent() {
        let (runner, scheduler) = setup();
        let now = local_now();
        let d = deadline(1, now + Duration::days(10));
        scheduler.schedule_for_at(&d, now);
        scheduler.schedule_for_at(&d, now);
        assert_eq!(runner.len(), 4);
    }

    #[test]
    fn test_schedule_then_cancel_leaves_no_jobs() {
        let (runner, scheduler) = setup();
        let now = local_now();
        scheduler.schedule_for_at(&deadline(1, now + Duration::days(2)), now);
        scheduler.schedule_for_at(&deadline(10, now + Duration::days(6)), now);

        assert_eq!(
            sorted_names(&runner),
            vec![
                "deadline_10_0days",
                "deadline_10_1days",
                "deadline_10_3days",
                "deadline_10_5days",
                "deadline_1_0days",
                "deadline_1_1days"
            ]
        );

        assert_eq!(scheduler.cancel_for(1), 2);
        assert!(runner
            .list_names()
            .iter()
            .all(|name| !name.starts_with(&job_prefix(1))));
        assert_eq!(runner.len(), 4);
    }

    #[test]
    fn test_restore_skips_past_deadlines_and_offsets() {
        let (runner, scheduler) = setup();
        let now = local_now();
        let deadlines = vec![
            deadline(1, now - Duration::days(1)),
            deadline(2, now + Duration::days(2)),
            deadline(3, now + Duration::days(10)),
        ];

        let summary = scheduler.restore_all_at(&deadlines, now);
        assert_eq!(
            summary,
            RestoreSummary {
                deadlines: 2,
                jobs: 6,
                dropped: 2
            }
        );
        assert!(runner.list_names().iter().all(|n| !n.starts_with(&job_prefix(1))));
        assert!(runner.next_fire("deadline_2_3days").is_none());
        assert!(runner.next_fire("deadline_2_1days").is_some());
        for name in runner.list_names() {
            assert!(runner.next_fire(&name).unwrap() > now);
        }
    }

    #[test]
    fn test_job_snapshot_is_independent() {
        let (runner, scheduler) = setup();
        let now = local_now();
        let mut d = deadline(4, now + Duration::days(1) + Duration::hours(1));
        scheduler.schedule_for_at(&d, now);
        d.title = "changed".into();

        let fired = runner.take_due(now + Duration::days(2));
        let titles: Vec<String> = fired
            .into_iter()
            .filter_map(|f| match f.payload {
                JobPayload::Reminder(job) => Some(job.deadline.title),
                _ => None,
            })
            .collect();
        assert_eq!(titles, vec!["HW1", "HW1"]);
    }

    /// Runner whose cancel fails for one job name
    struct FlakyRunner {
        inner: TokioJobRunner,
        fail_on: String,
        attempts: Mutex<Vec<String>>,
    }

    impl JobRunner for FlakyRunner {
        fn upsert(&self, name: &str, trigger: JobTrigger, payload: JobPayload) -> BotResult<NaiveDateTime> {
            self.inner.upsert(name, trigger, payload)
        }

        fn cancel(&self, name: &str) -> BotResult<()> {
            self.attempts.lock().unwrap().push(name.to_string());
            if name == self.fail_on {
                return Err(BotError::JobNotFound(name.to_string()));
            }
            self.inner.cancel(name)
        }

        fn list_names(&self) -> Vec<String> {
            self.inner.list_names()
        }

        fn next_fire(&self, name: &str) -> Option<NaiveDateTime> {
            self.inner.next_fire(name)
        }
    }

    #[test]
    fn test_cancel_continues_after_failure() {
        let runner = Arc::new(FlakyRunner {
            inner: TokioJobRunner::new(),
            fail_on: job_key(5, 1),
            attempts: Mutex::new(Vec::new()),
        });
        let scheduler = ReminderScheduler::new(runner.clone());
        let now = local_now();
        scheduler.schedule_for_at(&deadline(5, now + Duration::days(10)), now);

        assert_eq!(scheduler.cancel_for(5), 3);
        assert_eq!(runner.attempts.lock().unwrap().len(), 4);
        assert_eq!(runner.list_names(), vec![job_key(5, 1)]);
    }
}
