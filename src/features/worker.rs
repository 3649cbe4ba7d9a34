//! Consumer side of the job runner channel
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::features::notifications::NotificationDispatcher;
use crate::features::recurring::DailyCheck;
use crate::features::reminders::{FiredJob, JobPayload};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Routes fired jobs to the dispatcher or to a daily check
pub struct JobWorker {
    dispatcher: Arc<NotificationDispatcher>,
    daily: HashMap<String, Arc<DailyCheck>>,
}

impl JobWorker {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            dispatcher,
            daily: HashMap::new(),
        }
    }

    pub fn with_daily(mut self, check: Arc<DailyCheck>) -> Self {
        self.daily.insert(check.name().to_string(), check);
        self
    }

    /// Handle jobs until the runner side of the channel closes
    ///
    /// Each job gets its own task so a slow fan-out never delays the next
    /// reminder.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<FiredJob>) {
        info!("Job worker started");
        while let Some(job) = rx.recv().await {
            let worker = self.clone();
            tokio::spawn(async move { worker.handle(job).await });
        }
        info!("Job channel closed, worker stopping");
    }

    pub async fn handle(&self, job: FiredJob) {
        match job.payload {
            JobPayload::Reminder(reminder) => {
                self.dispatcher.fire(&reminder).await;
            }
            JobPayload::Recurring { name } => match self.daily.get(&name) {
                Some(check) => {
                    check.on_fired(job.scheduled_for).await;
                }
                None => warn!("No recurring check named '{name}' (job {})", job.name),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::deadlines::{local_now, Deadline, Identity};
    use crate::features::notifications::{
        BroadcastTarget, Destination, MessageFormat, Notifier, UserRegistry,
    };
    use crate::features::reminders::{JobRunner, JobTrigger, ReminderJob, TokioJobRunner};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<Destination>>);

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, destination: Destination, _: &str, _: MessageFormat) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(destination);
            Ok(())
        }
    }

    struct NoUsers;

    #[async_trait]
    impl UserRegistry for NoUsers {
        async fn all_known_users(&self) -> BTreeSet<Identity> {
            BTreeSet::new()
        }
    }

    fn private_deadline() -> Deadline {
        Deadline {
            id: 1,
            title: "Essay".into(),
            subject: "History".into(),
            description: String::new(),
            due_at: local_now() + Duration::days(1),
            is_private: true,
            created_by: 42,
            created_in: 42,
            author_display_name: "Ann".into(),
        }
    }

    #[tokio::test]
    async fn test_runner_to_worker_delivers_reminder() {
        let notifier = Arc::new(Recording::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifier.clone(),
            Arc::new(NoUsers),
            Arc::new(BroadcastTarget::new(None)),
            std::time::Duration::from_secs(1),
        ));
        let worker = Arc::new(JobWorker::new(dispatcher));

        let runner = Arc::new(TokioJobRunner::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let runner_handle = runner.clone().spawn(tx);
        let worker_handle = tokio::spawn(worker.run(rx));

        let job = ReminderJob::new(&private_deadline(), 1);
        runner
            .upsert(
                "deadline_1_1days",
                JobTrigger::At(local_now() + Duration::milliseconds(100)),
                JobPayload::Reminder(job),
            )
            .unwrap();

        let delivered = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                if !notifier.0.lock().unwrap().is_empty() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(delivered.is_ok());
        assert_eq!(*notifier.0.lock().unwrap(), vec![Destination::User(42)]);

        runner_handle.abort();
        worker_handle.abort();
    }

    #[tokio::test]
    async fn test_unknown_recurring_job_is_ignored() {
        let notifier = Arc::new(Recording::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifier.clone(),
            Arc::new(NoUsers),
            Arc::new(BroadcastTarget::new(None)),
            std::time::Duration::from_secs(1),
        ));
        let worker = JobWorker::new(dispatcher);
        worker
            .handle(FiredJob {
                name: "mystery".into(),
                scheduled_for: local_now(),
                payload: JobPayload::Recurring {
                    name: "mystery".into(),
                },
            })
            .await;
        assert!(notifier.0.lock().unwrap().is_empty());
    }
}
