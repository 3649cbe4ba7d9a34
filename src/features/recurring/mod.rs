//! # Recurring Feature
//!
//! Daily checks that run on the shared job runner.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod birthdays;
pub mod daily;

pub use birthdays::BirthdayCheck;
pub use daily::{misfire_due, CongratulationCheck, DailyCheck, DAILY_CHECK_JOB};
