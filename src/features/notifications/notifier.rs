//! Outbound collaborators used by the dispatcher
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::features::deadlines::Identity;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;

/// Where a message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Destination {
    /// Direct message to a user
    User(Identity),
    /// Group channel, or an existing DM channel
    Channel(Identity),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::User(id) => write!(f, "user {id}"),
            Destination::Channel(id) => write!(f, "channel {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Plain,
    Markdown,
}

/// Sends one message to one destination
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        destination: Destination,
        text: &str,
        format: MessageFormat,
    ) -> anyhow::Result<()>;
}

/// Enumerates everyone who should receive shared notices
#[async_trait]
pub trait UserRegistry: Send + Sync {
    async fn all_known_users(&self) -> BTreeSet<Identity>;
}
