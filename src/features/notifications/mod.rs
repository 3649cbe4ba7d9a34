//! # Notifications Feature
//!
//! Turns fired reminders and deadline changes into outbound messages.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Creation and removal announcements
//! - 1.0.0: Reminder fan-out over a pluggable notifier

pub mod discord;
pub mod dispatcher;
pub mod notifier;

pub use discord::SerenityNotifier;
pub use dispatcher::{
    render_reminder, urgency_label, BroadcastTarget, DeliveryReport, NotificationDispatcher,
};
pub use notifier::{Destination, MessageFormat, Notifier, UserRegistry};
