//! In-memory deadline collection backed by the JSON store
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Persisted id counter; ids are never reused
//! - 1.0.0: Add/remove/list with load-time deduplication

use super::model::{local_now, truncate_to_minute, Deadline, DeadlineFilter, NewDeadline};
use crate::core::{BotError, BotResult};
use crate::store::JsonStore;
use chrono::NaiveDateTime;
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct RegistryState {
    /// Insertion order
    deadlines: Vec<Deadline>,
    /// Highest id ever assigned
    last_id: u64,
}

/// Owner of every live deadline
///
/// Reads take the shared lock; add/remove take the exclusive lock and
/// persist before returning. Cross-component ordering (registry then
/// scheduler) is enforced by [`super::DeadlineService`].
pub struct DeadlineRegistry {
    store: Arc<JsonStore>,
    state: RwLock<RegistryState>,
}

impl DeadlineRegistry {
    /// Create an empty registry; call [`Self::load_and_deduplicate`] at startup
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self {
            store,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Load the persisted set, normalize it and persist the cleaned result
    ///
    /// Returns the number of duplicate records removed. A read failure is
    /// logged and leaves the registry empty.
    pub async fn load_and_deduplicate(&self) -> usize {
        let stored_last_id = match self.store.load_last_id().await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to read deadline id counter: {e}");
                0
            }
        };

        let loaded = match self.store.load_deadlines().await {
            Ok(Some(deadlines)) => deadlines,
            Ok(None) => {
                info!("No deadline file yet, starting with an empty set");
                Vec::new()
            }
            Err(e) => {
                error!("Failed to read deadlines, starting with an empty set: {e}");
                // Ids already handed out stay reserved
                *self.state.write().await = RegistryState {
                    deadlines: Vec::new(),
                    last_id: stored_last_id,
                };
                return 0;
            }
        };

        let normalized: Vec<Deadline> = loaded
            .into_iter()
            .map(|mut d| {
                d.due_at = truncate_to_minute(d.due_at);
                d
            })
            .collect();
        let (unique, removed) = deduplicate(normalized);

        let max_id = unique.iter().map(|d| d.id).max().unwrap_or(0);
        let mut last_id = stored_last_id.max(max_id);
        let (unique, reassigned) = reassign_colliding_ids(unique, &mut last_id);

        let mut state = self.state.write().await;
        state.deadlines = unique;
        state.last_id = last_id;
        self.persist(&state).await;

        if reassigned > 0 {
            warn!("Reassigned {reassigned} deadline(s) with colliding ids");
        }
        info!(
            "Loaded {} deadlines ({} duplicates removed)",
            state.deadlines.len(),
            removed
        );
        removed
    }

    /// Validate, assign an id, append and persist
    pub async fn add(&self, new: NewDeadline) -> BotResult<Deadline> {
        self.add_at(new, local_now()).await
    }

    pub(crate) async fn add_at(&self, new: NewDeadline, now: NaiveDateTime) -> BotResult<Deadline> {
        new.validate(now)?;

        let mut state = self.state.write().await;
        state.last_id += 1;
        let deadline = new.into_deadline(state.last_id);
        state.deadlines.push(deadline.clone());
        self.persist(&state).await;

        info!(
            "Added {} deadline {} '{} / {}' due {}",
            deadline.kind_label().to_lowercase(),
            deadline.id,
            deadline.subject,
            deadline.title,
            deadline.due_display()
        );
        Ok(deadline)
    }

    /// Remove by id and persist; returns the removed record
    pub async fn remove(&self, id: u64) -> BotResult<Deadline> {
        let mut state = self.state.write().await;
        let index = state
            .deadlines
            .iter()
            .position(|d| d.id == id)
            .ok_or(BotError::NotFound(id))?;
        let removed = state.deadlines.remove(index);
        self.persist(&state).await;

        info!("Removed deadline {} '{} / {}'", id, removed.subject, removed.title);
        Ok(removed)
    }

    /// Deadlines matching `filter`, in insertion order
    ///
    /// The returned iterator is single-pass over a point-in-time copy.
    pub async fn list(&self, filter: DeadlineFilter) -> impl Iterator<Item = Deadline> {
        self.list_at(filter, local_now()).await
    }

    pub(crate) async fn list_at(
        &self,
        filter: DeadlineFilter,
        now: NaiveDateTime,
    ) -> impl Iterator<Item = Deadline> {
        let snapshot = self.snapshot().await;
        snapshot.into_iter().filter(move |d| filter.matches(d, now))
    }

    pub async fn get(&self, id: u64) -> Option<Deadline> {
        self.state
            .read()
            .await
            .deadlines
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// Copy of every live deadline
    pub async fn snapshot(&self) -> Vec<Deadline> {
        self.state.read().await.deadlines.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.deadlines.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Write the set and counter; failures are logged, never returned
    ///
    /// The in-memory state stays authoritative for this process.
    async fn persist(&self, state: &RegistryState) {
        if let Err(e) = self.store.save_deadlines(&state.deadlines).await {
            error!(
                "Failed to persist {} deadlines, changes will be lost on restart: {e}",
                state.deadlines.len()
            );
        }
        if let Err(e) = self.store.save_last_id(state.last_id).await {
            error!("Failed to persist deadline id counter {}: {e}", state.last_id);
        }
    }
}

/// Keep the first record of each (subject, title, due_at, description)
pub fn deduplicate(deadlines: Vec<Deadline>) -> (Vec<Deadline>, usize) {
    let before = deadlines.len();
    let mut seen = HashSet::new();
    let unique: Vec<Deadline> = deadlines
        .into_iter()
        .filter(|d| seen.insert(d.dedup_key()))
        .collect();
    let removed = before - unique.len();
    (unique, removed)
}

/// Give fresh ids to records whose id is already taken
fn reassign_colliding_ids(deadlines: Vec<Deadline>, last_id: &mut u64) -> (Vec<Deadline>, usize) {
    let mut taken = HashSet::new();
    let mut reassigned = 0;
    let deadlines = deadlines
        .into_iter()
        .map(|mut d| {
            if !taken.insert(d.id) || d.id == 0 {
                *last_id += 1;
                d.id = *last_id;
                taken.insert(d.id);
                reassigned += 1;
            }
            d
        })
        .collect();
    (deadlines, reassigned)
}
