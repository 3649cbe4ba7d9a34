//! Reminder and announcement delivery
//!
//! Messages are composed from the deadline snapshot carried by the job, never
//! from live registry state. Sends fan out concurrently, each bounded by a
//! timeout; one recipient failing never affects the others.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Creation and removal announcements
//! - 1.0.0: Reminder fan-out

use super::notifier::{Destination, MessageFormat, Notifier, UserRegistry};
use crate::core::{mention, BotError};
use crate::features::deadlines::{Deadline, Identity};
use crate::features::reminders::ReminderJob;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

/// Outcome of one fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Group destination for shared notices
///
/// Resolution order: runtime override, configured channel, then the
/// deadline's own origin.
#[derive(Debug, Default)]
pub struct BroadcastTarget {
    configured: Option<Identity>,
    runtime: RwLock<Option<Identity>>,
}

impl BroadcastTarget {
    pub fn new(configured: Option<Identity>) -> Self {
        Self {
            configured,
            runtime: RwLock::new(None),
        }
    }

    /// Override the broadcast channel until restart
    pub async fn set_runtime(&self, channel: Identity) {
        *self.runtime.write().await = Some(channel);
        info!("Broadcast channel set to {channel}");
    }

    pub async fn current(&self) -> Option<Identity> {
        self.runtime.read().await.or(self.configured)
    }

    pub async fn resolve(&self, origin: Identity) -> Identity {
        self.current().await.unwrap_or(origin)
    }
}

/// Human urgency line for a reminder offset
pub fn urgency_label(offset_days: i64) -> String {
    match offset_days {
        0 => "📌 **Deadline is TODAY!**".to_string(),
        1 => "⏰ **Reminder: 1 day left until the deadline!**".to_string(),
        n => format!("⏰ **Reminder: {n} days left until the deadline!**"),
    }
}

/// Reminder body without any audience header
pub fn render_reminder(job: &ReminderJob) -> String {
    let d = &job.deadline;
    let mut text = format!(
        "{}\n\n📕 Subject: {}\n📝 Task: {}\n📅 Due: {}\n💬 Description: {}\n",
        urgency_label(job.offset_days),
        d.subject,
        d.title,
        d.due_display(),
        d.description
    );
    if !d.is_private {
        text.push_str(&format!("👤 Author: {}", author_of(d)));
    }
    text
}

fn author_of(deadline: &Deadline) -> String {
    mention(&deadline.author_display_name, deadline.created_by)
}

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    users: Arc<dyn UserRegistry>,
    broadcast: Arc<BroadcastTarget>,
    send_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        users: Arc<dyn UserRegistry>,
        broadcast: Arc<BroadcastTarget>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            notifier,
            users,
            broadcast,
            send_timeout,
        }
    }

    pub fn broadcast(&self) -> &Arc<BroadcastTarget> {
        &self.broadcast
    }

    /// Deliver one fired reminder
    ///
    /// Private: the creator only. Shared: the broadcast channel plus every
    /// known user.
    pub async fn fire(&self, job: &ReminderJob) -> DeliveryReport {
        let d = &job.deadline;
        let body = render_reminder(job);

        let messages = if d.is_private {
            vec![(
                Destination::User(d.created_by),
                format!("🔒 **Personal deadline**\n{body}"),
            )]
        } else {
            let group = self.broadcast.resolve(job.destination_hint).await;
            let mut messages = vec![(Destination::Channel(group), body.clone())];
            messages.extend(
                self.users
                    .all_known_users()
                    .await
                    .into_iter()
                    .map(|user| (Destination::User(user), format!("📢 **Shared deadline**\n{body}"))),
            );
            messages
        };

        let report = self.deliver_all(messages).await;
        info!(
            "Reminder for deadline {} ({} days before): {} delivered, {} failed",
            d.id, job.offset_days, report.delivered, report.failed
        );
        report
    }

    /// Tell the group and other users about a new shared deadline
    ///
    /// The group copy is skipped when the deadline was created in the group
    /// channel itself, where the command reply is already visible.
    pub async fn announce_created(&self, deadline: &Deadline) -> DeliveryReport {
        if deadline.is_private {
            return DeliveryReport::default();
        }

        let text = format!(
            "⚠️ **New shared deadline!**\nSubject: {}\nTask: {}\nDue: {}\nDescription: {}\nAuthor: {}",
            deadline.subject,
            deadline.title,
            deadline.due_display(),
            deadline.description,
            author_of(deadline)
        );

        let mut messages = Vec::new();
        let group = self.broadcast.resolve(deadline.created_in).await;
        if group != deadline.created_in {
            messages.push((Destination::Channel(group), text.clone()));
        }
        messages.extend(
            self.users
                .all_known_users()
                .await
                .into_iter()
                .filter(|user| *user != deadline.created_by)
                .map(|user| (Destination::User(user), format!("(Shared deadline) {text}"))),
        );

        let report = self.deliver_all(messages).await;
        debug!(
            "Announced deadline {}: {} delivered, {} failed",
            deadline.id, report.delivered, report.failed
        );
        report
    }

    /// Tell the group and other users that a shared deadline was removed
    pub async fn announce_removed(
        &self,
        deadline: &Deadline,
        remover: Identity,
        remover_name: &str,
    ) -> DeliveryReport {
        if deadline.is_private {
            return DeliveryReport::default();
        }

        let text = format!(
            "⚠️ **Shared deadline removed!**\nID: {}\nSubject: {}\nTask: {}\nDue: {}\nRemoved by: {}",
            deadline.id,
            deadline.subject,
            deadline.title,
            deadline.due_display(),
            mention(remover_name, remover)
        );

        let group = self.broadcast.resolve(deadline.created_in).await;
        let mut messages = vec![(Destination::Channel(group), text.clone())];
        messages.extend(
            self.users
                .all_known_users()
                .await
                .into_iter()
                .filter(|user| *user != remover)
                .map(|user| (Destination::User(user), text.clone())),
        );

        let report = self.deliver_all(messages).await;
        debug!(
            "Announced removal of deadline {}: {} delivered, {} failed",
            deadline.id, report.delivered, report.failed
        );
        report
    }

    /// Send a ready-made message to the broadcast channel
    pub async fn send_to_group(
        &self,
        origin: Identity,
        text: String,
        format: MessageFormat,
    ) -> DeliveryReport {
        let group = self.broadcast.resolve(origin).await;
        self.deliver_all_as(vec![(Destination::Channel(group), text)], format)
            .await
    }

    async fn deliver_all(&self, messages: Vec<(Destination, String)>) -> DeliveryReport {
        self.deliver_all_as(messages, MessageFormat::Markdown).await
    }

    async fn deliver_all_as(
        &self,
        messages: Vec<(Destination, String)>,
        format: MessageFormat,
    ) -> DeliveryReport {
        let mut tasks = JoinSet::new();
        for (destination, text) in messages {
            let notifier = self.notifier.clone();
            let timeout = self.send_timeout;
            tasks.spawn(async move {
                let outcome = tokio::time::timeout(
                    timeout,
                    notifier.send(destination, &text, format),
                )
                .await;
                match outcome {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(BotError::Delivery {
                        destination: destination.to_string(),
                        reason: e.to_string(),
                    }),
                    Err(_) => Err(BotError::Delivery {
                        destination: destination.to_string(),
                        reason: format!("timed out after {}s", timeout.as_secs_f32()),
                    }),
                }
            });
        }

        let mut report = DeliveryReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!("{e}");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Send task failed: {e}");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
