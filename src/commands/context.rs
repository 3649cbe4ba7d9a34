//! Shared context for command handlers
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Known users tracked for shared broadcasts
//! - 1.0.0: Initial implementation with core shared state

use crate::core::Config;
use crate::features::deadlines::DeadlineService;
use crate::features::notifications::{BroadcastTarget, NotificationDispatcher};
use crate::features::users::KnownUsers;
use std::sync::Arc;

/// Shared context for all command handlers
///
/// Contains the services every deadline command needs:
/// - DeadlineService for the deadline lifecycle
/// - NotificationDispatcher for announcements
/// - KnownUsers for recipient registration
/// - Config for origin checks
#[derive(Clone)]
pub struct CommandContext {
    pub service: Arc<DeadlineService>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub known_users: Arc<KnownUsers>,
    pub config: Arc<Config>,
    pub start_time: std::time::Instant,
}

impl CommandContext {
    pub fn new(
        service: Arc<DeadlineService>,
        dispatcher: Arc<NotificationDispatcher>,
        known_users: Arc<KnownUsers>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            service,
            dispatcher,
            known_users,
            config,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn broadcast(&self) -> &Arc<BroadcastTarget> {
        self.dispatcher.broadcast()
    }
}
