//! Everyone who has interacted with the bot
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::features::deadlines::Identity;
use crate::features::notifications::UserRegistry;
use crate::store::JsonStore;
use async_trait::async_trait;
use log::{error, info};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Append-only recipient set, persisted on every new member
pub struct KnownUsers {
    store: Arc<JsonStore>,
    users: RwLock<BTreeSet<Identity>>,
}

impl KnownUsers {
    /// Load the persisted set; an unreadable file starts empty
    pub async fn load(store: Arc<JsonStore>) -> Self {
        let users = match store.load_known_users().await {
            Ok(users) => users,
            Err(e) => {
                error!("Failed to read known users, starting empty: {e}");
                BTreeSet::new()
            }
        };
        info!("Loaded {} known users", users.len());
        Self {
            store,
            users: RwLock::new(users),
        }
    }

    /// Add a user; returns true when they were new
    pub async fn record(&self, user: Identity) -> bool {
        let mut users = self.users.write().await;
        if !users.insert(user) {
            return false;
        }
        if let Err(e) = self.store.save_known_users(&users).await {
            error!("Failed to persist known users: {e}");
        }
        info!("New known user {user} ({} total)", users.len());
        true
    }

    pub async fn contains(&self, user: Identity) -> bool {
        self.users.read().await.contains(&user)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRegistry for KnownUsers {
    async fn all_known_users(&self) -> BTreeSet<Identity> {
        self.users.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_persists_new_users_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()));
        let users = KnownUsers::load(store.clone()).await;

        assert!(users.record(42).await);
        assert!(!users.record(42).await);
        assert!(users.record(7).await);
        assert_eq!(users.len().await, 2);

        let reloaded = KnownUsers::load(store).await;
        assert!(reloaded.contains(42).await);
        assert_eq!(
            reloaded.all_known_users().await,
            [7, 42].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(crate::store::USERS_FILE), "nope").unwrap();
        let users = KnownUsers::load(Arc::new(JsonStore::new(dir.path()))).await;
        assert!(users.is_empty().await);
    }
}
