//! # Deadlines Feature
//!
//! Deadline records, the persisted registry and the lifecycle service that
//! keeps reminder jobs in step with them.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Lifecycle service with a single writer
//! - 1.0.0: Registry with load-time deduplication

pub mod model;
pub mod registry;
pub mod service;

pub use model::{
    local_now, parse_due_input, truncate_to_minute, Deadline, DeadlineFilter, Identity,
    NewDeadline, TemporalFilter, DUE_DISPLAY_FORMAT, REMINDER_OFFSETS_DAYS,
};
pub use registry::{deduplicate, DeadlineRegistry};
pub use service::{DeadlineService, StartupSummary};
