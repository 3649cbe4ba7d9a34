//! # Users Feature
//!
//! Known recipients and per-user action throttling. `KnownUsers` backs the
//! bot's reminder fan-out; `ActionCooldown` is library-only and not wired
//! into any slash command.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod cooldown;
pub mod known_users;

pub use cooldown::{ActionCooldown, DEFAULT_ACTION_COOLDOWN_DAYS};
pub use known_users::KnownUsers;
