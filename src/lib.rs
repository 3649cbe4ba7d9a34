// Core layer - shared types, configuration and errors
pub mod core;

// Persistence layer - JSON documents in the data directory
pub mod store;

// Features layer - deadlines, reminders, notifications, daily checks
pub mod features;

// Application layer - Discord slash commands
pub mod commands;

pub use core::{BotError, BotResult, Config};

pub use features::{
    // Deadlines
    Deadline, DeadlineFilter, DeadlineRegistry, DeadlineService, NewDeadline,
    // Notifications
    BroadcastTarget, NotificationDispatcher, SerenityNotifier,
    // Recurring
    BirthdayCheck, DailyCheck,
    // Reminders
    ReminderScheduler, TokioJobRunner,
    // Users (ActionCooldown is for embedders; the bot binary does not throttle)
    ActionCooldown, KnownUsers,
    // Worker
    JobWorker,
};
