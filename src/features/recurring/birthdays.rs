//! Birthday congratulations
//!
//! Reads a JSON array of people and greets everyone born on today's day and
//! month in the broadcast channel. Legacy files with Russian column names
//! (`имя`, `фамилия`, `дата рождения`) load as well.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use super::daily::CongratulationCheck;
use crate::features::deadlines::local_now;
use crate::features::notifications::{MessageFormat, NotificationDispatcher};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    #[serde(alias = "имя", default)]
    pub first_name: String,
    #[serde(alias = "фамилия", default)]
    pub last_name: String,
    #[serde(alias = "дата рождения", default)]
    pub birthday: Option<String>,
}

impl Person {
    /// `Last First`, as the group roster is written
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name.trim(), self.first_name.trim())
            .trim()
            .to_string()
    }
}

/// Accepts `%Y-%m-%dT%H:%M:%S%.f`, `%Y-%m-%d` and `%d.%m.%Y`
pub fn parse_birthday(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d.%m.%Y"))
        .ok()
}

/// Names of everyone whose birthday falls on `today`'s day and month
pub fn birthdays_on(people: &[Person], today: NaiveDate) -> Vec<String> {
    people
        .iter()
        .filter_map(|person| {
            let raw = person.birthday.as_deref()?;
            let Some(date) = parse_birthday(raw) else {
                debug!("Unrecognised birthday '{raw}' for {}", person.full_name());
                return None;
            };
            (date.day() == today.day() && date.month() == today.month())
                .then(|| person.full_name())
                .filter(|name| !name.is_empty())
        })
        .collect()
}

pub fn congratulation_text(names: &[String]) -> Option<String> {
    let wishes = "Wishing you good health, success in your studies and all the best! 🎁🥳";
    match names {
        [] => None,
        [one] => Some(format!(
            "🎂 **Happy Birthday!** 🎉\n\nToday **{one}** celebrates their birthday!\n\n{wishes}"
        )),
        many => Some(format!(
            "🎂 **Happy Birthday!** 🎉\n\nCelebrating their birthday today:\n- {}\n\n{wishes}",
            many.join("\n- ")
        )),
    }
}

pub struct BirthdayCheck {
    file: PathBuf,
    dispatcher: Arc<NotificationDispatcher>,
}

impl BirthdayCheck {
    pub fn new(file: impl Into<PathBuf>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            file: file.into(),
            dispatcher,
        }
    }

    /// Load people from the configured file; malformed entries are skipped
    pub async fn load_people(&self) -> anyhow::Result<Vec<Person>> {
        let contents = match tokio::fs::read_to_string(&self.file).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Birthday file not found: {}", self.file.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<serde_json::Value> = serde_json::from_str(&contents)?;
        let people: Vec<Person> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Person>(entry.clone()) {
                Ok(person) if person.birthday.as_deref().is_some_and(|b| !b.trim().is_empty()) => {
                    Some(person)
                }
                Ok(_) => {
                    warn!("Skipping birthday entry without a date: {entry}");
                    None
                }
                Err(e) => {
                    warn!("Skipping malformed birthday entry {entry}: {e}");
                    None
                }
            })
            .collect();
        info!("Loaded {} birthday records", people.len());
        Ok(people)
    }
}

#[async_trait]
impl CongratulationCheck for BirthdayCheck {
    async fn run(&self) -> anyhow::Result<()> {
        let today = local_now().date();
        let people = self.load_people().await?;
        let names = birthdays_on(&people, today);

        let Some(text) = congratulation_text(&names) else {
            info!("No birthdays on {today}");
            return Ok(());
        };
        let Some(channel) = self.dispatcher.broadcast().current().await else {
            warn!(
                "{} birthday(s) today but no broadcast channel is set",
                names.len()
            );
            return Ok(());
        };

        // Names come from an external file; nothing in it may ping
        let report = self
            .dispatcher
            .send_to_group(channel, text, MessageFormat::Plain)
            .await;
        info!(
            "Sent birthday congratulations for {} people ({} delivered)",
            names.len(),
            report.delivered
        );
        Ok(())
    }
}
