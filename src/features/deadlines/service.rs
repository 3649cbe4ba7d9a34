//! Deadline lifecycle facade
//!
//! Pairs every registry mutation with the matching job-set update under one
//! writer lock, so concurrent add/remove calls can never interleave their
//! registry and scheduler halves.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use super::model::{local_now, Deadline, DeadlineFilter, Identity, NewDeadline};
use super::registry::DeadlineRegistry;
use crate::core::{BotError, BotResult};
use crate::features::reminders::{ReminderScheduler, RestoreSummary};
use chrono::NaiveDateTime;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What startup recovery did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StartupSummary {
    pub duplicates_removed: usize,
    pub restore: RestoreSummary,
}

pub struct DeadlineService {
    registry: Arc<DeadlineRegistry>,
    scheduler: Arc<ReminderScheduler>,
    writer: Mutex<()>,
}

impl DeadlineService {
    pub fn new(registry: Arc<DeadlineRegistry>, scheduler: Arc<ReminderScheduler>) -> Self {
        Self {
            registry,
            scheduler,
            writer: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<DeadlineRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    /// Load and clean the persisted set, then restore reminder jobs
    ///
    /// Call once, before the job runner and the transport start.
    pub async fn startup(&self) -> StartupSummary {
        self.startup_at(local_now()).await
    }

    pub(crate) async fn startup_at(&self, now: NaiveDateTime) -> StartupSummary {
        let _guard = self.writer.lock().await;
        let duplicates_removed = self.registry.load_and_deduplicate().await;
        let deadlines = self.registry.snapshot().await;
        let restore = self.scheduler.restore_all_at(&deadlines, now);
        info!(
            "Deadline startup complete: {} deadlines, {} reminders pending",
            deadlines.len(),
            restore.jobs
        );
        StartupSummary {
            duplicates_removed,
            restore,
        }
    }

    /// Create a deadline and schedule its reminders
    pub async fn add(&self, new: NewDeadline) -> BotResult<Deadline> {
        self.add_at(new, local_now()).await
    }

    pub(crate) async fn add_at(&self, new: NewDeadline, now: NaiveDateTime) -> BotResult<Deadline> {
        let _guard = self.writer.lock().await;
        let deadline = self.registry.add_at(new, now).await?;
        self.scheduler.schedule_for_at(&deadline, now);
        Ok(deadline)
    }

    /// Delete a deadline and cancel its pending reminders
    pub async fn remove(&self, id: u64) -> BotResult<Deadline> {
        let _guard = self.writer.lock().await;
        let removed = self.registry.remove(id).await?;
        self.scheduler.cancel_for(id);
        Ok(removed)
    }

    /// Delete on behalf of `actor`; another user's private deadline is
    /// reported as not found
    pub async fn remove_as(&self, id: u64, actor: Identity) -> BotResult<Deadline> {
        let _guard = self.writer.lock().await;
        match self.registry.get(id).await {
            Some(d) if d.is_visible_to(actor) => {}
            _ => return Err(BotError::NotFound(id)),
        }
        let removed = self.registry.remove(id).await?;
        self.scheduler.cancel_for(id);
        Ok(removed)
    }

    pub async fn list(&self, filter: DeadlineFilter) -> impl Iterator<Item = Deadline> {
        self.registry.list(filter).await
    }

    pub(crate) async fn list_at(
        &self,
        filter: DeadlineFilter,
        now: NaiveDateTime,
    ) -> impl Iterator<Item = Deadline> {
        self.registry.list_at(filter, now).await
    }

    pub async fn get(&self, id: u64) -> Option<Deadline> {
        self.registry.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reminders::{job_key, job_prefix, JobRunner, TokioJobRunner};
    use crate::store::JsonStore;
    use chrono::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        runner: Arc<TokioJobRunner>,
        service: DeadlineService,
    }

    fn fixture_in(dir: tempfile::TempDir) -> Fixture {
        let store = Arc::new(JsonStore::new(dir.path()));
        let runner = Arc::new(TokioJobRunner::new());
        let scheduler = Arc::new(ReminderScheduler::new(runner.clone()));
        let service = DeadlineService::new(Arc::new(DeadlineRegistry::new(store)), scheduler);
        Fixture {
            _dir: dir,
            runner,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_in(tempfile::tempdir().unwrap())
    }

    fn shared(title: &str, due_at: NaiveDateTime) -> NewDeadline {
        NewDeadline {
            subject: "Math".into(),
            title: title.into(),
            description: "Exercises".into(),
            due_at,
            is_private: false,
            created_by: 11,
            created_in: 500,
            author_display_name: "Ann".into(),
        }
    }

    fn sorted_names(runner: &TokioJobRunner) -> Vec<String> {
        let mut names = runner.list_names();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_add_then_remove_scenario() {
        let f = fixture();
        let now = local_now();

        let d = f
            .service
            .add_at(shared("HW1", now + Duration::days(2)), now)
            .await
            .unwrap();
        assert_eq!(d.id, 1);
        assert_eq!(sorted_names(&f.runner), vec![job_key(1, 0), job_key(1, 1)]);

        f.service.remove(1).await.unwrap();
        assert!(f
            .runner
            .list_names()
            .iter()
            .all(|n| !n.starts_with(&job_prefix(1))));
        assert_eq!(
            f.service
                .list_at(DeadlineFilter::active_for(11), now)
                .await
                .count(),
            0
        );
    }

    #[tokio::test]
    async fn test_failed_add_schedules_nothing() {
        let f = fixture();
        let now = local_now();
        let result = f
            .service
            .add_at(shared("late", now - Duration::hours(1)), now)
            .await;
        assert!(matches!(result, Err(BotError::Validation(_))));
        assert!(f.runner.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_keeps_jobs() {
        let f = fixture();
        let now = local_now();
        f.service
            .add_at(shared("HW1", now + Duration::days(10)), now)
            .await
            .unwrap();
        assert!(matches!(f.service.remove(7).await, Err(BotError::NotFound(7))));
        assert_eq!(f.runner.len(), 4);
    }

    #[tokio::test]
    async fn test_remove_as_hides_foreign_private_deadlines() {
        let f = fixture();
        let now = local_now();
        let mut new = shared("secret", now + Duration::days(10));
        new.is_private = true;
        let d = f.service.add_at(new, now).await.unwrap();

        assert!(matches!(
            f.service.remove_as(d.id, 99).await,
            Err(BotError::NotFound(_))
        ));
        assert_eq!(f.runner.len(), 4);

        f.service.remove_as(d.id, 11).await.unwrap();
        assert!(f.runner.is_empty());
    }

    #[tokio::test]
    async fn test_startup_restores_from_disk() {
        let first = fixture();
        let now = local_now();
        first
            .service
            .add_at(shared("near", now + Duration::days(2)), now)
            .await
            .unwrap();
        first
            .service
            .add_at(shared("far", now + Duration::days(10)), now)
            .await
            .unwrap();

        let restarted = fixture_in(first._dir);
        let summary = restarted.service.startup_at(now).await;
        assert_eq!(summary.duplicates_removed, 0);
        assert_eq!(summary.restore.deadlines, 2);
        assert_eq!(summary.restore.jobs, 6);
        assert_eq!(restarted.runner.len(), 6);
        for name in restarted.runner.list_names() {
            assert!(restarted.runner.next_fire(&name).unwrap() > now);
        }
    }

    #[tokio::test]
    async fn test_concurrent_adds_keep_jobs_consistent() {
        let f = Arc::new(fixture());
        let now = local_now();
        let mut handles = Vec::new();
        for i in 0..10 {
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                f.service
                    .add_at(shared(&format!("t{i}"), now + Duration::days(10)), now)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(f.service.registry().len().await, 10);
        assert_eq!(f.runner.len(), 40);
    }
}
