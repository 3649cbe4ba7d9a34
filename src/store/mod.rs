//! # JSON Document Store
//!
//! Durable load/save of the bot's JSON documents inside a data directory.
//! Writes go to a temporary file first and are renamed into place, so a crash
//! mid-write leaves the previous document intact. Writes are serialized per
//! store, so clones sharing a directory never interleave on a `.json.tmp`.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Serialized writes; recurring run updates are read-modify-write under the lock

use crate::core::BotResult;
use crate::features::deadlines::{Deadline, Identity};
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEADLINES_FILE: &str = "deadlines_data.json";
pub const USERS_FILE: &str = "users.json";
pub const ACTIONS_FILE: &str = "user_actions.json";
pub const COUNTER_FILE: &str = "deadline_counter.json";
pub const RECURRING_RUNS_FILE: &str = "recurring_runs.json";

/// user id -> action kind -> ISO-8601 timestamp
pub type ActionTimes = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CounterDocument {
    last_id: u64,
}

/// File-backed store rooted at a data directory
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load a document; `Ok(None)` when the file does not exist
    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> BotResult<Option<T>> {
        let path = self.path(name);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_str(&contents)?;
        debug!("Loaded {}", path.display());
        Ok(Some(value))
    }

    /// Save a document as pretty-printed JSON
    pub async fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> BotResult<()> {
        let _guard = self.write_lock.lock().await;
        self.save_unlocked(name, value).await
    }

    /// Caller must hold `write_lock`
    async fn save_unlocked<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> BotResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(name);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Saved {}", path.display());
        Ok(())
    }

    pub async fn load_deadlines(&self) -> BotResult<Option<Vec<Deadline>>> {
        self.load(DEADLINES_FILE).await
    }

    pub async fn save_deadlines(&self, deadlines: &[Deadline]) -> BotResult<()> {
        self.save(DEADLINES_FILE, deadlines).await
    }

    /// Highest deadline id ever handed out
    pub async fn load_last_id(&self) -> BotResult<u64> {
        Ok(self
            .load::<CounterDocument>(COUNTER_FILE)
            .await?
            .unwrap_or_default()
            .last_id)
    }

    pub async fn save_last_id(&self, last_id: u64) -> BotResult<()> {
        self.save(COUNTER_FILE, &CounterDocument { last_id }).await
    }

    /// Known users are stored as an array of identity strings
    pub async fn load_known_users(&self) -> BotResult<BTreeSet<Identity>> {
        let raw: Vec<String> = self.load(USERS_FILE).await?.unwrap_or_default();
        Ok(raw
            .into_iter()
            .filter_map(|id| match id.trim().parse::<Identity>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("Skipping malformed user id '{id}' in {USERS_FILE}");
                    None
                }
            })
            .collect())
    }

    pub async fn save_known_users(&self, users: &BTreeSet<Identity>) -> BotResult<()> {
        let raw: Vec<String> = users.iter().map(|id| id.to_string()).collect();
        self.save(USERS_FILE, &raw).await
    }

    pub async fn load_action_times(&self) -> BotResult<ActionTimes> {
        Ok(self.load(ACTIONS_FILE).await?.unwrap_or_default())
    }

    pub async fn save_action_times(&self, actions: &ActionTimes) -> BotResult<()> {
        self.save(ACTIONS_FILE, actions).await
    }

    /// Last completed run of each recurring job
    pub async fn load_recurring_runs(&self) -> BotResult<HashMap<String, NaiveDateTime>> {
        let raw: HashMap<String, String> =
            self.load(RECURRING_RUNS_FILE).await?.unwrap_or_default();
        Ok(raw
            .into_iter()
            .filter_map(|(name, ts)| ts.parse::<NaiveDateTime>().ok().map(|ts| (name, ts)))
            .collect())
    }

    pub async fn save_recurring_run(&self, name: &str, ran_at: NaiveDateTime) -> BotResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut raw: HashMap<String, String> =
            self.load(RECURRING_RUNS_FILE).await?.unwrap_or_default();
        raw.insert(name.to_string(), ran_at.format("%Y-%m-%dT%H:%M:%S").to_string());
        self.save_unlocked(RECURRING_RUNS_FILE, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BotError;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn deadline(id: u64) -> Deadline {
        Deadline {
            id,
            title: "Test".into(),
            subject: "Math".into(),
            description: "Homework".into(),
            due_at: at("2030-05-01 12:30"),
            is_private: true,
            created_by: 123,
            created_in: 456,
            author_display_name: "Test User".into(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        assert!(store.load_deadlines().await.unwrap().is_none());
        assert_eq!(store.load_last_id().await.unwrap(), 0);
        assert!(store.load_known_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deadlines_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested"));
        let saved = vec![deadline(1), deadline(2)];
        store.save_deadlines(&saved).await.unwrap();

        let loaded = store.load_deadlines().await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(!dir.path().join("nested/deadlines_data.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEADLINES_FILE), "{not json").unwrap();
        let store = JsonStore::new(dir.path());
        assert!(matches!(
            store.load_deadlines().await,
            Err(BotError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_known_users_stored_as_strings() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let users: BTreeSet<Identity> = [100, -5].into_iter().collect();
        store.save_known_users(&users).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(USERS_FILE)).unwrap();
        let strings: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(strings, vec!["-5".to_string(), "100".to_string()]);
        assert_eq!(store.load_known_users().await.unwrap(), users);
    }

    #[tokio::test]
    async fn test_counter_and_recurring_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store.save_last_id(41).await.unwrap();
        assert_eq!(store.load_last_id().await.unwrap(), 41);

        store
            .save_recurring_run("daily", at("2030-05-01 08:00"))
            .await
            .unwrap();
        let runs = store.load_recurring_runs().await.unwrap();
        assert_eq!(runs.get("daily"), Some(&at("2030-05-01 08:00")));
    }

    #[tokio::test]
    async fn test_concurrent_recurring_runs_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()));

        let mut tasks = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .save_recurring_run(&format!("job{i}"), at("2030-05-01 08:00"))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let runs = store.load_recurring_runs().await.unwrap();
        assert_eq!(runs.len(), 10);
        assert!(!dir.path().join("recurring_runs.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_clones_share_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let clone = store.clone();

        let first = [deadline(1)];
        let second = [deadline(1), deadline(2)];
        let (a, b) = tokio::join!(
            store.save_deadlines(&first),
            clone.save_deadlines(&second),
        );
        a.unwrap();
        b.unwrap();

        let loaded = store.load_deadlines().await.unwrap().unwrap();
        assert!(loaded.len() == 1 || loaded.len() == 2);
        assert!(Arc::ptr_eq(&store.write_lock, &clone.write_lock));
    }
}
