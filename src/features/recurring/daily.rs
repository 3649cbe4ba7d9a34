//! Daily recurring check with misfire grace
//!
//! The check is registered on the shared job runner as a daily trigger. When
//! the process starts after today's slot, within the grace window, and the
//! check has not run since that slot, one catch-up run fires immediately.
//! The last completed run is persisted so a restart never repeats a day.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::core::BotResult;
use crate::features::deadlines::local_now;
use crate::features::reminders::{JobPayload, JobRunner, JobTrigger};
use crate::store::JsonStore;
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use log::{error, info, warn};
use std::sync::Arc;

/// Job name of the daily congratulation check
pub const DAILY_CHECK_JOB: &str = "daily_congratulations";

/// Something that runs once a day and may send messages
#[async_trait]
pub trait CongratulationCheck: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

/// Most recent `hour:minute` slot at or before `now`
fn last_slot(hour: u32, minute: u32, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let today = now.date().and_time(NaiveTime::from_hms_opt(hour, minute, 0)?);
    Some(if today <= now {
        today
    } else {
        today - Duration::days(1)
    })
}

/// Whether a missed slot should still run now
pub fn misfire_due(
    last_run: Option<NaiveDateTime>,
    now: NaiveDateTime,
    hour: u32,
    minute: u32,
    grace: Duration,
) -> bool {
    let Some(slot) = last_slot(hour, minute, now) else {
        return false;
    };
    now - slot <= grace && last_run.map_or(true, |ran| ran < slot)
}

pub struct DailyCheck {
    name: String,
    hour: u32,
    minute: u32,
    grace: Duration,
    check: Arc<dyn CongratulationCheck>,
    store: Arc<JsonStore>,
}

impl DailyCheck {
    pub fn new(
        name: impl Into<String>,
        (hour, minute): (u32, u32),
        grace: Duration,
        check: Arc<dyn CongratulationCheck>,
        store: Arc<JsonStore>,
    ) -> Self {
        Self {
            name: name.into(),
            hour,
            minute,
            grace,
            check,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn catchup_name(&self) -> String {
        format!("{}_catchup", self.name)
    }

    fn payload(&self) -> JobPayload {
        JobPayload::Recurring {
            name: self.name.clone(),
        }
    }

    /// Put the daily job on the runner, plus a catch-up run if one is owed
    pub async fn register(&self, runner: &dyn JobRunner) -> BotResult<NaiveDateTime> {
        self.register_at(runner, local_now()).await
    }

    pub(crate) async fn register_at(
        &self,
        runner: &dyn JobRunner,
        now: NaiveDateTime,
    ) -> BotResult<NaiveDateTime> {
        let next = runner.upsert(
            &self.name,
            JobTrigger::Daily {
                hour: self.hour,
                minute: self.minute,
            },
            self.payload(),
        )?;
        info!(
            "Daily check '{}' scheduled at {:02}:{:02}, next run {next}",
            self.name, self.hour, self.minute
        );

        let last_run = match self.store.load_recurring_runs().await {
            Ok(runs) => runs.get(&self.name).copied(),
            Err(e) => {
                error!("Failed to read recurring run marks: {e}");
                None
            }
        };
        if misfire_due(last_run, now, self.hour, self.minute, self.grace) {
            info!("Daily check '{}' missed today's slot, running now", self.name);
            runner.upsert(&self.catchup_name(), JobTrigger::At(now), self.payload())?;
        }
        Ok(next)
    }

    /// Run the check for a fired slot
    ///
    /// Runs later than the grace window are skipped. Returns whether the
    /// check ran.
    pub async fn on_fired(&self, scheduled_for: NaiveDateTime) -> bool {
        self.on_fired_at(scheduled_for, local_now()).await
    }

    pub(crate) async fn on_fired_at(&self, scheduled_for: NaiveDateTime, now: NaiveDateTime) -> bool {
        if now - scheduled_for > self.grace {
            warn!(
                "Skipping daily check '{}' scheduled for {scheduled_for}: past the misfire grace",
                self.name
            );
            return false;
        }

        if let Err(e) = self.check.run().await {
            error!("Daily check '{}' failed: {e:#}", self.name);
        }
        if let Err(e) = self.store.save_recurring_run(&self.name, now).await {
            error!("Failed to persist last run of '{}': {e}", self.name);
        }
        true
    }
}
