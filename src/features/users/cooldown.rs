//! Per-user action throttle
//!
//! Keyed by (user, action kind) like the request limiter, but with one
//! persisted timestamp per key instead of a sliding window.
//!
//! Library-only: the bot binary has no command that is throttled this way,
//! so nothing in `bin/bot.rs` constructs one. Embedders wire it in front of
//! their own actions.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Snapshot and save happen under one writer lock

use crate::features::deadlines::{local_now, Identity};
use crate::store::{ActionTimes, JsonStore};
use chrono::{Duration, NaiveDateTime};
use dashmap::DashMap;
use log::{error, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default window between two actions of the same kind
pub const DEFAULT_ACTION_COOLDOWN_DAYS: i64 = 7;

type ActionKey = (Identity, String);

pub struct ActionCooldown {
    store: Arc<JsonStore>,
    last: DashMap<ActionKey, NaiveDateTime>,
    window: Duration,
    writer: Mutex<()>,
}

impl ActionCooldown {
    pub async fn load(store: Arc<JsonStore>, window: Duration) -> Self {
        let raw = match store.load_action_times().await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to read action times, starting empty: {e}");
                ActionTimes::new()
            }
        };

        let last = DashMap::new();
        for (user, actions) in raw {
            let Ok(user_id) = user.parse::<Identity>() else {
                warn!("Skipping malformed user id '{user}' in action times");
                continue;
            };
            for (action, ts) in actions {
                match ts.parse::<NaiveDateTime>() {
                    Ok(ts) => {
                        last.insert((user_id, action), ts);
                    }
                    Err(e) => warn!("Skipping bad timestamp '{ts}' for user {user}: {e}"),
                }
            }
        }

        Self {
            store,
            last,
            window,
            writer: Mutex::new(()),
        }
    }

    pub fn can_perform(&self, user: Identity, action: &str) -> bool {
        self.can_perform_at(user, action, local_now())
    }

    pub(crate) fn can_perform_at(&self, user: Identity, action: &str, now: NaiveDateTime) -> bool {
        self.last
            .get(&(user, action.to_string()))
            .map_or(true, |last| now - *last >= self.window)
    }

    /// Remember that `user` performed `action` now, and persist
    pub async fn record(&self, user: Identity, action: &str) {
        self.record_at(user, action, local_now()).await
    }

    pub(crate) async fn record_at(&self, user: Identity, action: &str, now: NaiveDateTime) {
        // A later snapshot must never be overwritten by an earlier one
        let _guard = self.writer.lock().await;
        self.last.insert((user, action.to_string()), now);
        if let Err(e) = self.store.save_action_times(&self.to_document()).await {
            error!("Failed to persist action times: {e}");
        }
    }

    fn to_document(&self) -> ActionTimes {
        let mut doc = ActionTimes::new();
        for entry in self.last.iter() {
            let (user, action) = entry.key();
            doc.entry(user.to_string())
                .or_default()
                .insert(action.clone(), entry.value().format("%Y-%m-%dT%H:%M:%S").to_string());
        }
        doc
    }
}
