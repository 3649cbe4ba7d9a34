//! # Features
//!
//! Feature modules of the deadline bot. Each module header carries its
//! version and changelog; [`get_features`] mirrors them for `/help`.

pub mod deadlines;
pub mod notifications;
pub mod recurring;
pub mod reminders;
pub mod users;
pub mod worker;

pub use deadlines::{Deadline, DeadlineFilter, DeadlineRegistry, DeadlineService, NewDeadline};
pub use notifications::{BroadcastTarget, NotificationDispatcher, SerenityNotifier};
pub use recurring::{BirthdayCheck, DailyCheck};
pub use reminders::{ReminderScheduler, TokioJobRunner};
pub use users::{ActionCooldown, KnownUsers};
pub use worker::JobWorker;

/// Name and version of one feature module
#[derive(Debug, Clone, Copy)]
pub struct FeatureInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub toggleable: bool,
}

pub fn get_bot_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn get_features() -> Vec<FeatureInfo> {
    vec![
        FeatureInfo {
            id: "deadlines",
            name: "Deadlines",
            version: "1.1.0",
            toggleable: false,
        },
        FeatureInfo {
            id: "reminders",
            name: "Reminders",
            version: "2.0.0",
            toggleable: false,
        },
        FeatureInfo {
            id: "notifications",
            name: "Notifications",
            version: "1.1.0",
            toggleable: false,
        },
        FeatureInfo {
            id: "recurring",
            name: "Daily checks",
            version: "1.0.0",
            toggleable: false,
        },
        FeatureInfo {
            id: "users",
            name: "Users",
            version: "1.0.0",
            toggleable: false,
        },
    ]
}
