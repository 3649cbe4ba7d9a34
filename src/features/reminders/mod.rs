//! # Reminders Feature
//!
//! Multi-stage deadline reminders on top of a named delayed-job runner.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Jobs keyed per deadline and offset, tokio runner with mpsc hand-off
//! - 1.0.0: Initial scheduler

pub mod runner;
pub mod scheduler;

pub use runner::{next_daily, FiredJob, JobPayload, JobRunner, JobTrigger, TokioJobRunner};
pub use scheduler::{job_key, job_prefix, ReminderJob, ReminderScheduler, RestoreSummary};
